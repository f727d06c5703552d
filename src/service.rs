//! Entry operations and the request/response envelope around them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use crate::config::{ScraperConfig, DEFAULT_TARGET_URL};
use crate::error::SetupError;
use crate::models::{ContactInfo, ListingDetail, ListingRecord};
use crate::scrapers::browser::ChromeRenderer;
use crate::scrapers::contact::ContactRevealer;
use crate::scrapers::detail::DetailExtractor;
use crate::scrapers::fetch::{FetchStrategySelector, ReqwestTransport};
use crate::scrapers::page::PageExtractor;
use crate::scrapers::pagination::PaginationNavigator;
use crate::scrapers::traits::{HttpTransport, Renderer};
use crate::session::{ScrapeSession, SessionReport};
use crate::store::{JsonFileStore, MemoryStore, RecordStore};

/// Upper bound on listings returned by one `multiple` request.
pub const MAX_LISTINGS: u32 = 100;
/// Rough number of cards on one results page.
pub const LISTINGS_PER_PAGE: u32 = 20;
const CONTACT_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    #[default]
    Latest,
    Multiple,
}

fn default_request_url() -> String {
    DEFAULT_TARGET_URL.to_string()
}

fn default_num_listings() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub mode: ScrapeMode,
    #[serde(default = "default_request_url")]
    pub url: String,
    #[serde(default = "default_num_listings")]
    pub num_listings: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ScrapeResponse {
    fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Wires the extraction engine to its transports.
pub struct Scraper {
    config: ScraperConfig,
    fetcher: Arc<FetchStrategySelector>,
    contact: ContactRevealer,
    detail: DetailExtractor,
}

impl Scraper {
    /// Production wiring: reqwest for the lightweight tier, headless Chrome
    /// for full renders.
    pub fn from_config(config: ScraperConfig) -> Result<Self, SetupError> {
        let http = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let renderer = Arc::new(ChromeRenderer::new(
            config.headless,
            config.request_timeout().saturating_mul(2),
        ));
        Self::with_transports(config, http, renderer)
    }

    pub fn with_transports(
        config: ScraperConfig,
        http: Arc<dyn HttpTransport>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, SetupError> {
        let extractor = match &config.card_selectors {
            Some(cards) => PageExtractor::from_spec(cards)?,
            None => PageExtractor::with_defaults()?,
        };
        let navigator = match &config.pagination_selectors {
            Some(next) => PaginationNavigator::from_spec(next)?,
            None => PaginationNavigator::with_defaults()?,
        };
        let fetcher = FetchStrategySelector::new(http, renderer, Arc::new(extractor), Arc::new(navigator))
            .with_user_agents(config.user_agents())
            .with_timing(config.render_timing());

        Ok(Self {
            contact: ContactRevealer::new(config.render_timing().click_settle)?,
            detail: DetailExtractor::new()?,
            fetcher: Arc::new(fetcher),
            config,
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Full configured run, persisted to `output_file`.
    pub async fn scrape(&self) -> SessionReport {
        let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new(&self.config.output_file));
        let mut session = ScrapeSession::new(
            &self.config.target_url,
            Arc::clone(&self.fetcher),
            store,
            self.config.session_policy(),
        );
        session.run().await
    }

    /// Up to `count` listings (capped at [`MAX_LISTINGS`]) from `url`.
    pub async fn scrape_multiple(&self, url: &str, count: u32) -> Vec<ListingRecord> {
        let wanted = count.min(MAX_LISTINGS);
        let pages = wanted / LISTINGS_PER_PAGE + 1;
        info!(url, wanted, pages, "scraping multiple listings");

        let mut records = self.collect(url, pages).await;
        records.truncate(wanted as usize);
        records
    }

    /// First listing on the results page at `url`, enriched with the agent
    /// contact details revealed on its own page.
    pub async fn get_latest_with_contact(&self, url: &str) -> anyhow::Result<ListingRecord> {
        let mut latest = self
            .collect(url, 1)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No listings found"))?;

        if latest.url.trim().is_empty() {
            return Err(anyhow!("Listing URL not found"));
        }
        let listing_url = absolute_listing_url(url, &latest.url)?;
        info!(url = %listing_url, "Extracting contact info");

        let contact = match self
            .fetcher
            .renderer()
            .open(&listing_url, &self.fetcher.user_agents().pick())
        {
            Ok(page) => self.contact.reveal(page.as_ref(), CONTACT_WAIT).await,
            Err(e) => {
                warn!(url = %listing_url, error = %e, "could not open listing page");
                ContactInfo::failed(&listing_url, e.to_string())
            }
        };
        latest.enrich_with_contact(contact);
        Ok(latest)
    }

    /// Everything a single listing page exposes.
    pub async fn extract_detail(&self, url: &str) -> anyhow::Result<ListingDetail> {
        let (markup, source) = self
            .fetcher
            .fetch_markup(url)
            .await
            .with_context(|| format!("failed to fetch listing page {url}"))?;
        info!(url, ?source, "fetched listing page");
        Ok(self.detail.extract(&markup, url))
    }

    /// Serves one adapter request. Failures become `success: false`.
    pub async fn handle(&self, request: &ScrapeRequest) -> ScrapeResponse {
        let outcome: anyhow::Result<ScrapeResponse> = match request.mode {
            ScrapeMode::Latest => self.get_latest_with_contact(&request.url).await.and_then(|record| {
                Ok(ScrapeResponse::ok(
                    "Found latest listing",
                    serde_json::to_value(record)?,
                ))
            }),
            ScrapeMode::Multiple => {
                let records = self.scrape_multiple(&request.url, request.num_listings).await;
                serde_json::to_value(&records)
                    .map(|data| {
                        ScrapeResponse::ok(format!("Successfully scraped {} listings", records.len()), data)
                    })
                    .map_err(Into::into)
            }
        };

        outcome.unwrap_or_else(|e| {
            error!(mode = ?request.mode, error = %e, "request failed");
            ScrapeResponse::failed(format!("Error: {e}"))
        })
    }

    /// A short, in-memory session over `url`.
    async fn collect(&self, url: &str, max_pages: u32) -> Vec<ListingRecord> {
        let mut policy = self.config.session_policy();
        policy.max_pages = Some(max_pages);
        let mut session = ScrapeSession::new(
            url,
            Arc::clone(&self.fetcher),
            Arc::new(MemoryStore::default()),
            policy,
        );
        session.run().await;
        session.into_records()
    }
}

/// Resolves a site-relative listing URL against the search page's origin.
fn absolute_listing_url(search_url: &str, listing_url: &str) -> anyhow::Result<String> {
    let base = Url::parse(search_url).with_context(|| format!("invalid search URL {search_url}"))?;
    let joined = base
        .join(listing_url)
        .with_context(|| format!("invalid listing URL {listing_url}"))?;
    Ok(joined.to_string())
}
