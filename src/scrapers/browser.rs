use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use tracing::{debug, info, warn};

use crate::error::{BrowserError, FetchError};
use crate::scrapers::traits::{ElementSnapshot, LivePage, Renderer};

/// Full-render transport backed by headless Chrome.
///
/// Each [`Renderer::open`] launches a fresh browser owned by the returned
/// page; dropping the page closes the tab and terminates the browser.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    headless: bool,
    navigation_timeout: Duration,
}

impl Default for ChromeRenderer {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

impl ChromeRenderer {
    pub fn new(headless: bool, navigation_timeout: Duration) -> Self {
        Self {
            headless,
            navigation_timeout,
        }
    }

    fn launch(&self) -> Result<Browser, BrowserError> {
        info!(headless = self.headless, "Launching Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(self.navigation_timeout.saturating_mul(4))
            .args(vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))
    }
}

impl Renderer for ChromeRenderer {
    fn open(&self, url: &str, user_agent: &str) -> Result<Box<dyn LivePage>, FetchError> {
        let browser = self.launch()?;
        let tab = browser.new_tab().map_err(|e| BrowserError::Launch(e.to_string()))?;
        tab.set_default_timeout(self.navigation_timeout);

        let page = ChromePage {
            _browser: browser,
            tab,
        };
        page.navigate(url, user_agent)?;
        Ok(Box::new(page))
    }
}

/// A live Chrome tab together with the browser that owns it.
pub struct ChromePage {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromePage {
    fn navigate(&self, url: &str, user_agent: &str) -> Result<(), BrowserError> {
        let navigation_error = |e: anyhow::Error| BrowserError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        if let Err(e) = self.tab.set_user_agent(user_agent, Some("en-US,en;q=0.5"), None) {
            warn!(error = %e, "could not override user agent");
        }
        debug!(url, "Navigating...");
        self.tab.navigate_to(url).map_err(navigation_error)?;
        self.tab.wait_until_navigated().map_err(navigation_error)?;
        Ok(())
    }

    fn evaluate_string(&self, script: &str) -> Result<String, BrowserError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    fn find_all(&self, css: &str) -> Vec<Element<'_>> {
        match self.tab.find_elements(css) {
            Ok(elements) => elements,
            Err(e) => {
                debug!(selector = css, error = %e, "no elements found");
                Vec::new()
            }
        }
    }
}

fn snapshot(element: &Element<'_>) -> ElementSnapshot {
    let text = element.get_inner_text().unwrap_or_default();
    let attributes = element.get_attributes().ok().flatten().unwrap_or_default();

    let mut class = None;
    let mut disabled = false;
    for pair in attributes.chunks(2) {
        match pair {
            [name, value] if name == "class" => class = Some(value.clone()),
            [name, value] if name == "disabled" || (name == "aria-disabled" && value == "true") => {
                disabled = true;
            }
            _ => {}
        }
    }

    ElementSnapshot {
        text: text.trim().to_string(),
        class,
        disabled,
    }
}

impl LivePage for ChromePage {
    fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.tab.get_url())
    }

    fn html(&self) -> Result<String, BrowserError> {
        self.tab
            .get_content()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    fn text(&self) -> Result<String, BrowserError> {
        self.evaluate_string("document.body ? document.body.innerText : ''")
    }

    fn texts(&self, css: &str) -> Result<Vec<String>, BrowserError> {
        Ok(self
            .find_all(css)
            .iter()
            .filter_map(|el| el.get_inner_text().ok())
            .map(|t| t.trim().to_string())
            .collect())
    }

    fn wait_for(&self, css: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.tab
            .wait_for_element_with_custom_timeout(css, timeout)
            .map(|_| ())
            .map_err(|_| BrowserError::WaitTimeout {
                selector: css.to_string(),
            })
    }

    fn click_first(
        &self,
        css: &str,
        accept: &dyn Fn(&ElementSnapshot) -> bool,
    ) -> Result<bool, BrowserError> {
        let interaction = |e: anyhow::Error| BrowserError::Interaction {
            selector: css.to_string(),
            reason: e.to_string(),
        };

        for element in self.find_all(css) {
            if !accept(&snapshot(&element)) {
                continue;
            }
            element.scroll_into_view().map_err(interaction)?;
            element.click().map_err(interaction)?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            debug!(error = %e, "tab close failed, browser shutdown will reap it");
        }
        debug!("releasing Chrome");
    }
}
