use std::time::Duration;

use async_trait::async_trait;
use scraper::ElementRef;

use crate::error::{BrowserError, FetchError};
use crate::models::ListingRecord;
use crate::scrapers::types::RequestProfile;

/// Turns one listing-card element into a record.
/// New sites plug in by implementing this and registering a host matcher.
pub trait CardExtractor: Send + Sync {
    /// Extract a record; missing fields fall back to sentinels.
    fn extract(&self, card: ElementRef<'_>) -> ListingRecord;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Lightweight transport: a plain HTTP GET returning the response body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, profile: &RequestProfile) -> Result<String, FetchError>;
}

/// Full-render transport: launches a rendering engine and navigates to `url`.
///
/// The returned page owns the engine; dropping it terminates the engine,
/// so every exit path of the caller releases it.
pub trait Renderer: Send + Sync {
    fn open(&self, url: &str, user_agent: &str) -> Result<Box<dyn LivePage>, FetchError>;
}

/// What a live page reports about an element before interacting with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub text: String,
    pub class: Option<String>,
    pub disabled: bool,
}

impl ElementSnapshot {
    pub fn has_class(&self, token: &str) -> bool {
        self.class
            .as_deref()
            .is_some_and(|c| c.split_whitespace().any(|t| t == token))
    }
}

/// A rendered, scriptable page.
pub trait LivePage: Send {
    /// URL the page currently shows; changes after a navigating click.
    fn current_url(&self) -> Result<String, BrowserError>;

    /// Serialized DOM of the current state.
    fn html(&self) -> Result<String, BrowserError>;

    /// Visible text of the document body.
    fn text(&self) -> Result<String, BrowserError>;

    /// Visible text of every element matching `css`.
    fn texts(&self, css: &str) -> Result<Vec<String>, BrowserError>;

    /// Block until `css` matches or `timeout` elapses.
    fn wait_for(&self, css: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Scroll the first element matching `css` that `accept` approves into
    /// view and click it. Returns whether a click happened.
    fn click_first(
        &self,
        css: &str,
        accept: &dyn Fn(&ElementSnapshot) -> bool,
    ) -> Result<bool, BrowserError>;
}
