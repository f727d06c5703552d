//! The top-level scrape driver: walks result pages, deduplicates, retries,
//! forces progress and persists.
//!
//! Every run reaches a terminal state. A page that keeps failing is retried
//! up to `max_retries` times, then skipped by synthesizing the next page
//! URL, so a single bad page never stalls the walk. Under total failure the
//! walk is cut off after `max_forced_advances` consecutive skips.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use scraper::Html;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::models::ListingRecord;
use crate::scrapers::fetch::FetchStrategySelector;
use crate::scrapers::pagination::synthesize_next_url;
use crate::scrapers::types::{PageFetchResult, PaginationState};
use crate::store::RecordStore;

/// Uniformly random delay between `min` and `max`, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: Self = Self::fixed(Duration::ZERO);

    pub const fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Retry, pacing and persistence knobs for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Highest page number to fetch; `None` walks until pagination ends.
    pub max_pages: Option<u32>,
    /// Attempts per page before forcing progress to the next one.
    pub max_retries: u32,
    /// Persist after every this many completed pages. Zero disables
    /// periodic saves; the final save always happens.
    pub save_every: u32,
    pub page_delay: DelayRange,
    pub retry_delay: DelayRange,
    /// Consecutive forced advances after which the walk gives up.
    pub max_forced_advances: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        let jitter = DelayRange {
            min: Duration::from_secs(2),
            max: Duration::from_secs(5),
        };
        Self {
            max_pages: None,
            max_retries: 3,
            save_every: 3,
            page_delay: jitter,
            retry_delay: jitter,
            max_forced_advances: 5,
        }
    }
}

/// Why a session reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last page had no enabled "next" control.
    NoNextPage,
    /// The configured page ceiling was reached.
    PageLimit,
    /// The next URL had already been fetched in this session.
    CycleDetected,
    /// Too many pages in a row failed on both transports.
    ForcedAdvanceLimit,
}

/// Where the session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Fetching { page: u32, url: String },
    Done(StopReason),
}

/// Result of asking the session to fetch one URL.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The URL was fetched earlier in this session; nothing was requested.
    AlreadyVisited,
    Fetched(PageFetchResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub pages_completed: u32,
    pub records: usize,
    pub forced_advances: u32,
    pub saves: u32,
    pub stop_reason: StopReason,
    /// Last persistence failure, if any. Records stay in memory regardless.
    pub persist_error: Option<String>,
}

/// One walk over a paginated result set.
pub struct ScrapeSession {
    fetcher: Arc<FetchStrategySelector>,
    store: Arc<dyn RecordStore>,
    policy: SessionPolicy,
    pagination: PaginationState,
    records: Vec<ListingRecord>,
    saves: u32,
    persist_error: Option<String>,
}

impl ScrapeSession {
    pub fn new(
        base_url: &str,
        fetcher: Arc<FetchStrategySelector>,
        store: Arc<dyn RecordStore>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            fetcher,
            store,
            policy,
            pagination: PaginationState::new(base_url),
            records: Vec::new(),
            saves: 0,
            persist_error: None,
        }
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ListingRecord> {
        self.records
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    /// Fetches `url` unless it was already fetched in this session. A URL
    /// counts as visited only once a fetch of it has succeeded.
    pub async fn fetch_page(&mut self, url: &str) -> Result<FetchOutcome, FetchError> {
        if self.pagination.is_visited(url) {
            info!("Skipping already scraped URL: {}", url);
            return Ok(FetchOutcome::AlreadyVisited);
        }
        let result = self.fetcher.fetch(url).await?;
        self.pagination.mark_visited(url);
        Ok(FetchOutcome::Fetched(result))
    }

    /// Drives the session to `Done`, then persists the full record set.
    pub async fn run(&mut self) -> SessionReport {
        let mut pages_completed = 0u32;
        let mut forced_advances = 0u32;
        let mut forced_in_a_row = 0u32;

        let stop_reason = loop {
            let state = self.next_state(forced_in_a_row);
            let (page, url) = match state {
                SessionState::Fetching { page, url } => (page, url),
                SessionState::Done(reason) => break reason,
            };

            info!("📄 Processing page {}: {}", page, url);

            match self.fetch_page(&url).await {
                Ok(FetchOutcome::AlreadyVisited) => break StopReason::CycleDetected,
                Ok(FetchOutcome::Fetched(result)) => {
                    let found = result.records.len();
                    self.records.extend(result.records.iter().cloned());
                    pages_completed += 1;
                    forced_in_a_row = 0;
                    self.pagination.consecutive_failures = 0;

                    let next = self.decide_next(&result, page);
                    info!(
                        page,
                        found,
                        total = self.records.len(),
                        source = ?result.source,
                        "✅ Page complete"
                    );

                    if self.policy.save_every > 0 && pages_completed % self.policy.save_every == 0 {
                        self.persist().await;
                    }

                    self.pagination.current_page = page.saturating_add(1);
                    self.pagination.next_url = next;
                    if self.pagination.next_url.is_some() && !self.past_page_limit() {
                        self.pause(self.policy.page_delay, "between pages").await;
                    }
                }
                Err(e) => {
                    self.pagination.consecutive_failures += 1;
                    let attempt = self.pagination.consecutive_failures;
                    if attempt < self.policy.max_retries {
                        warn!(
                            page,
                            attempt,
                            max_retries = self.policy.max_retries,
                            error = %e,
                            "both transports failed, retrying page"
                        );
                        self.pause(self.policy.retry_delay, "before retry").await;
                        continue;
                    }

                    let forced = synthesize_next_url(&url, page);
                    warn!(
                        page,
                        next = %forced,
                        error = %e,
                        "maximum retries reached, moving to next page"
                    );
                    self.pagination.consecutive_failures = 0;
                    self.pagination.current_page = page.saturating_add(1);
                    self.pagination.next_url = Some(forced);
                    forced_advances += 1;
                    forced_in_a_row += 1;
                    if forced_in_a_row < self.policy.max_forced_advances.max(1) && !self.past_page_limit() {
                        self.pause(self.policy.page_delay, "between pages").await;
                    }
                }
            }
        };

        info!(reason = ?stop_reason, pages = pages_completed, records = self.records.len(), "🏁 Session done");
        self.persist().await;

        SessionReport {
            pages_completed,
            records: self.records.len(),
            forced_advances,
            saves: self.saves,
            stop_reason,
            persist_error: self.persist_error.clone(),
        }
    }

    fn next_state(&self, forced_in_a_row: u32) -> SessionState {
        if forced_in_a_row >= self.policy.max_forced_advances.max(1) {
            warn!(forced_in_a_row, "giving up after repeated forced advances");
            return SessionState::Done(StopReason::ForcedAdvanceLimit);
        }
        let Some(url) = self.pagination.next_url.clone() else {
            return SessionState::Done(StopReason::NoNextPage);
        };
        if self.past_page_limit() {
            return SessionState::Done(StopReason::PageLimit);
        }
        SessionState::Fetching {
            page: self.pagination.current_page,
            url,
        }
    }

    fn past_page_limit(&self) -> bool {
        self.policy
            .max_pages
            .is_some_and(|max| self.pagination.current_page > max)
    }

    /// A navigating click on a live page wins; otherwise the markup decides.
    fn decide_next(&self, result: &PageFetchResult, page: u32) -> Option<String> {
        if let Some(url) = &result.navigated_next {
            debug!(next = %url, "next page reached by click");
            return Some(url.clone());
        }
        let navigator = self.fetcher.navigator();
        let document = Html::parse_document(&result.markup);
        if !navigator.has_next(&document) {
            info!("No more pages to scrape");
            return None;
        }
        let next = navigator.next_url(&document, &result.fetched_url, page);
        debug!(next = %next, "next page resolved from markup");
        Some(next)
    }

    async fn persist(&mut self) {
        if self.records.is_empty() {
            warn!("No properties to save");
        }
        match self.store.save(&self.records).await {
            Ok(()) => {
                self.saves += 1;
                self.persist_error = None;
            }
            Err(e) => {
                warn!(location = %self.store.location(), error = %e, "failed to persist records");
                self.persist_error = Some(e.to_string());
            }
        }
    }

    async fn pause(&self, delay: DelayRange, why: &str) {
        let wait = delay.sample();
        if !wait.is_zero() {
            debug!(millis = wait.as_millis() as u64, "waiting {why}");
            tokio::time::sleep(wait).await;
        }
    }
}
