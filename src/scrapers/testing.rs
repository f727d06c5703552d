//! In-memory transports and pages for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::{BrowserError, FetchError};
use crate::scrapers::cascade::{element_text, normalize_whitespace};
use crate::scrapers::traits::{ElementSnapshot, HttpTransport, LivePage, Renderer};
use crate::scrapers::types::RequestProfile;

#[derive(Debug, Clone)]
enum FakeResponse {
    Page(String),
    Status(u16),
}

/// Routed HTTP transport that records every request.
#[derive(Default)]
pub struct FakeHttp {
    routes: HashMap<String, FakeResponse>,
    calls: Mutex<Vec<String>>,
    user_agents: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn with_page(mut self, url: &str, markup: &str) -> Self {
        self.routes.insert(url.to_string(), FakeResponse::Page(markup.to_string()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(url.to_string(), FakeResponse::Status(status));
        self
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeHttp {
    async fn get(&self, url: &str, profile: &RequestProfile) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.user_agents.lock().unwrap().push(profile.user_agent.clone());
        match self.routes.get(url) {
            Some(FakeResponse::Page(markup)) => Ok(markup.clone()),
            Some(FakeResponse::Status(status)) => Err(FetchError::UnexpectedStatus {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(FetchError::UnexpectedStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// A clickable control on a [`FakePage`].
#[derive(Debug, Clone)]
pub struct FakeButton {
    pub css: String,
    pub text: String,
    pub class: Option<String>,
    pub disabled: bool,
    pub navigates_to: Option<String>,
    pub reveals: Option<String>,
}

/// Live page backed by static markup. Clicks can change the URL or append
/// markup to the document.
pub struct FakePage {
    url: Mutex<String>,
    html: Mutex<String>,
    buttons: Vec<FakeButton>,
    clicks: Arc<AtomicUsize>,
    released: Option<Arc<AtomicUsize>>,
    wait_fails: bool,
}

impl Clone for FakePage {
    fn clone(&self) -> Self {
        Self {
            url: Mutex::new(self.url.lock().unwrap().clone()),
            html: Mutex::new(self.html.lock().unwrap().clone()),
            buttons: self.buttons.clone(),
            clicks: Arc::clone(&self.clicks),
            released: self.released.clone(),
            wait_fails: self.wait_fails,
        }
    }
}

impl FakePage {
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            html: Mutex::new(html.to_string()),
            buttons: Vec::new(),
            clicks: Arc::new(AtomicUsize::new(0)),
            released: None,
            wait_fails: false,
        }
    }

    pub fn with_button(mut self, css: &str, text: &str, navigates_to: Option<&str>) -> Self {
        self.buttons.push(FakeButton {
            css: css.to_string(),
            text: text.to_string(),
            class: None,
            disabled: false,
            navigates_to: navigates_to.map(str::to_string),
            reveals: None,
        });
        self
    }

    pub fn with_reveal_button(mut self, css: &str, text: &str, reveals: &str) -> Self {
        self.buttons.push(FakeButton {
            css: css.to_string(),
            text: text.to_string(),
            class: None,
            disabled: false,
            navigates_to: None,
            reveals: Some(reveals.to_string()),
        });
        self
    }

    pub fn with_wait_failure(mut self) -> Self {
        self.wait_fails = true;
        self
    }

    pub fn click_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.clicks)
    }

    fn select_texts(&self, css: &str) -> Result<Vec<String>, BrowserError> {
        let selector =
            Selector::parse(css).map_err(|e| BrowserError::Script(e.to_string()))?;
        let html = self.html.lock().unwrap().clone();
        let document = Html::parse_document(&html);
        Ok(document.select(&selector).map(element_text).collect())
    }
}

impl Drop for FakePage {
    fn drop(&mut self) {
        if let Some(released) = &self.released {
            released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl LivePage for FakePage {
    fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.url.lock().unwrap().clone())
    }

    fn html(&self) -> Result<String, BrowserError> {
        Ok(self.html.lock().unwrap().clone())
    }

    fn text(&self) -> Result<String, BrowserError> {
        let html = self.html.lock().unwrap().clone();
        let document = Html::parse_document(&html);
        Ok(normalize_whitespace(
            &document.root_element().text().collect::<Vec<_>>().join(" "),
        ))
    }

    fn texts(&self, css: &str) -> Result<Vec<String>, BrowserError> {
        self.select_texts(css)
    }

    fn wait_for(&self, css: &str, _timeout: Duration) -> Result<(), BrowserError> {
        if self.wait_fails || self.select_texts(css)?.is_empty() {
            return Err(BrowserError::WaitTimeout {
                selector: css.to_string(),
            });
        }
        Ok(())
    }

    fn click_first(
        &self,
        css: &str,
        accept: &dyn Fn(&ElementSnapshot) -> bool,
    ) -> Result<bool, BrowserError> {
        let Some(button) = self.buttons.iter().find(|b| {
            b.css == css
                && accept(&ElementSnapshot {
                    text: b.text.clone(),
                    class: b.class.clone(),
                    disabled: b.disabled,
                })
        }) else {
            return Ok(false);
        };

        self.clicks.fetch_add(1, Ordering::SeqCst);
        if let Some(target) = &button.navigates_to {
            *self.url.lock().unwrap() = target.clone();
        }
        if let Some(extra) = &button.reveals {
            self.html.lock().unwrap().push_str(extra);
        }
        Ok(true)
    }
}

/// Renderer serving fake pages, counting launches and releases.
#[derive(Default)]
pub struct FakeRenderer {
    default_page: Option<FakePage>,
    routes: HashMap<String, FakePage>,
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl FakeRenderer {
    /// Every launch fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Serves a copy of `page` for any URL.
    pub fn serving(page: FakePage) -> Self {
        Self {
            default_page: Some(page),
            ..Self::default()
        }
    }

    pub fn with_route(mut self, url: &str, page: FakePage) -> Self {
        self.routes.insert(url.to_string(), page);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Renderer for FakeRenderer {
    fn open(&self, url: &str, _user_agent: &str) -> Result<Box<dyn LivePage>, FetchError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let template = self.routes.get(url).or(self.default_page.as_ref());
        match template {
            Some(template) => {
                let mut page = template.clone();
                page.released = Some(Arc::clone(&self.released));
                Ok(Box::new(page))
            }
            None => Err(FetchError::Browser(BrowserError::Launch(format!(
                "no page for {url}"
            )))),
        }
    }
}
