//! Two-tier page fetching: a plain HTTP request first, a full browser
//! render when that fails or yields no listing cards.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::scrapers::page::PageExtractor;
use crate::scrapers::pagination::PaginationNavigator;
use crate::scrapers::traits::{HttpTransport, Renderer};
use crate::scrapers::types::{FetchSource, PageFetchResult, RequestProfile, UserAgentPool};

/// reqwest-backed lightweight transport.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, profile: &RequestProfile) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, &profile.user_agent)
            .header(header::ACCEPT, profile.accept)
            .header(header::ACCEPT_LANGUAGE, profile.accept_language)
            .header(header::REFERER, profile.referer)
            .header(header::DNT, profile.dnt)
            .header(header::CONNECTION, profile.connection)
            .header(header::UPGRADE_INSECURE_REQUESTS, profile.upgrade_insecure_requests)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "lightweight fetch returned non-success status");
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!(url, bytes = body.len(), "downloaded page");
        Ok(body)
    }
}

/// Delays applied around full-render fetches.
#[derive(Debug, Clone, Copy)]
pub struct RenderTiming {
    /// Wait after navigation so client-side rendering can finish.
    pub settle: Duration,
    /// Wait after clicking a "next" control before reading the URL.
    pub click_settle: Duration,
}

impl Default for RenderTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            click_settle: Duration::from_secs(3),
        }
    }
}

/// Chooses between the lightweight and full-render transports.
///
/// Retry policy belongs to the caller; one call makes at most one attempt
/// per transport.
pub struct FetchStrategySelector {
    http: Arc<dyn HttpTransport>,
    renderer: Arc<dyn Renderer>,
    extractor: Arc<PageExtractor>,
    navigator: Arc<PaginationNavigator>,
    user_agents: UserAgentPool,
    timing: RenderTiming,
}

impl FetchStrategySelector {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        renderer: Arc<dyn Renderer>,
        extractor: Arc<PageExtractor>,
        navigator: Arc<PaginationNavigator>,
    ) -> Self {
        Self {
            http,
            renderer,
            extractor,
            navigator,
            user_agents: UserAgentPool::default(),
            timing: RenderTiming::default(),
        }
    }

    #[must_use]
    pub fn with_user_agents(mut self, user_agents: UserAgentPool) -> Self {
        self.user_agents = user_agents;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: RenderTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn navigator(&self) -> &PaginationNavigator {
        &self.navigator
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn user_agents(&self) -> &UserAgentPool {
        &self.user_agents
    }

    /// Fetches a results page and extracts its listing cards.
    ///
    /// # Errors
    ///
    /// [`FetchError::Exhausted`] when both transports failed; the message
    /// carries each transport's failure.
    pub async fn fetch(&self, url: &str) -> Result<PageFetchResult, FetchError> {
        let lightweight = match self.fetch_lightweight(url).await {
            Ok(result) => {
                info!(url, records = result.records.len(), "fetched page with lightweight transport");
                return Ok(result);
            }
            Err(e) => e,
        };
        warn!(url, error = %lightweight, "lightweight fetch failed, falling back to full render");

        match self.fetch_rendered(url).await {
            Ok(result) => {
                info!(url, records = result.records.len(), "fetched page with full render");
                Ok(result)
            }
            Err(full_render) => {
                warn!(url, error = %full_render, "full render failed");
                Err(FetchError::Exhausted {
                    url: url.to_string(),
                    lightweight: lightweight.to_string(),
                    full_render: full_render.to_string(),
                })
            }
        }
    }

    /// Fetches arbitrary markup (e.g. a listing detail page). Only transport
    /// failures and empty markup trigger the full-render fallback.
    pub async fn fetch_markup(&self, url: &str) -> Result<(String, FetchSource), FetchError> {
        let profile = RequestProfile::random(&self.user_agents);
        let lightweight = match self.http.get(url, &profile).await {
            Ok(markup) if !markup.trim().is_empty() => {
                return Ok((markup, FetchSource::Lightweight));
            }
            Ok(_) => FetchError::EmptyMarkup { url: url.to_string() },
            Err(e) => e,
        };
        warn!(url, error = %lightweight, "lightweight fetch failed, falling back to full render");

        let rendered = async {
            let page = self.renderer.open(url, &self.user_agents.pick())?;
            tokio::time::sleep(self.timing.settle).await;
            let markup = page.html()?;
            if markup.trim().is_empty() {
                return Err(FetchError::EmptyMarkup { url: url.to_string() });
            }
            Ok(markup)
        }
        .await;

        rendered
            .map(|markup| (markup, FetchSource::FullRender))
            .map_err(|full_render| FetchError::Exhausted {
                url: url.to_string(),
                lightweight: lightweight.to_string(),
                full_render: full_render.to_string(),
            })
    }

    async fn fetch_lightweight(&self, url: &str) -> Result<PageFetchResult, FetchError> {
        let profile = RequestProfile::random(&self.user_agents);
        debug!(url, user_agent = %profile.user_agent, "lightweight fetch");
        let markup = self.http.get(url, &profile).await?;
        if markup.trim().is_empty() {
            return Err(FetchError::EmptyMarkup { url: url.to_string() });
        }

        let records = self
            .extractor
            .extract(&markup, url)
            .into_records()
            .ok_or_else(|| FetchError::NoCards { url: url.to_string() })?;

        Ok(PageFetchResult {
            markup,
            source: FetchSource::Lightweight,
            fetched_url: url.to_string(),
            records,
            navigated_next: None,
        })
    }

    async fn fetch_rendered(&self, url: &str) -> Result<PageFetchResult, FetchError> {
        // The page owns the engine; it is released when `page` drops, on
        // every return path below.
        let page = self.renderer.open(url, &self.user_agents.pick())?;
        tokio::time::sleep(self.timing.settle).await;

        let markup = page.html()?;
        if markup.trim().is_empty() {
            return Err(FetchError::EmptyMarkup { url: url.to_string() });
        }

        let (records, has_next) = {
            let document = Html::parse_document(&markup);
            let records = self.extractor.extract_document(&document, url).into_records();
            (records, self.navigator.has_next(&document))
        };
        let records = records.ok_or_else(|| FetchError::NoCards { url: url.to_string() })?;

        let navigated_next = if has_next {
            self.navigator
                .next_via_click(page.as_ref(), self.timing.click_settle)
                .await
        } else {
            None
        };

        Ok(PageFetchResult {
            markup,
            source: FetchSource::FullRender,
            fetched_url: url.to_string(),
            records,
            navigated_next,
        })
    }
}
