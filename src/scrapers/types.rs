use std::collections::HashSet;
use std::path::Path;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::ListingRecord;

/// Built-in desktop user agents used when no external pool is configured.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// Non-empty pool of user-agent strings; one is picked at random per request.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            agents: DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl UserAgentPool {
    /// Builds a pool from the given agents, or the built-in pool if none
    /// survive trimming.
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agents: Vec<String> = agents
            .into_iter()
            .map(Into::into)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if agents.is_empty() {
            Self::default()
        } else {
            Self { agents }
        }
    }

    /// Loads one agent per line from `path`, falling back to the built-in
    /// pool when the file is absent, unreadable or empty.
    pub fn from_file_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let pool = Self::new(content.lines());
                debug!(path = %path.display(), agents = pool.len(), "loaded user-agent pool");
                pool
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "user-agent file unreadable, using built-in pool");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn pick(&self) -> String {
        self.agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string())
    }
}

/// Header set for one lightweight request: a rotating user agent plus
/// fixed hints resembling an organic browser visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    pub user_agent: String,
    pub accept: &'static str,
    pub accept_language: &'static str,
    pub referer: &'static str,
    pub dnt: &'static str,
    pub connection: &'static str,
    pub upgrade_insecure_requests: &'static str,
}

impl RequestProfile {
    pub fn random(pool: &UserAgentPool) -> Self {
        Self::with_user_agent(pool.pick())
    }

    pub fn with_user_agent(user_agent: String) -> Self {
        Self {
            user_agent,
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            accept_language: "en-US,en;q=0.5",
            referer: "https://www.google.com/",
            dnt: "1",
            connection: "keep-alive",
            upgrade_insecure_requests: "1",
        }
    }
}

/// Which transport produced a page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Lightweight,
    FullRender,
}

/// A successfully fetched and extracted results page.
#[derive(Debug, Clone)]
pub struct PageFetchResult {
    pub markup: String,
    pub source: FetchSource,
    pub fetched_url: String,
    pub records: Vec<ListingRecord>,
    /// URL reached by clicking the "next" control on a live page, when the
    /// click actually navigated.
    pub navigated_next: Option<String>,
}

/// Pagination bookkeeping owned by one scrape session.
#[derive(Debug, Clone)]
pub struct PaginationState {
    visited_urls: HashSet<String>,
    pub current_page: u32,
    pub consecutive_failures: u32,
    pub next_url: Option<String>,
}

impl PaginationState {
    pub fn new(base_url: &str) -> Self {
        Self {
            visited_urls: HashSet::new(),
            current_page: 1,
            consecutive_failures: 0,
            next_url: Some(base_url.to_string()),
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited_urls.contains(url)
    }

    /// Records `url` as visited. The set only ever grows.
    pub fn mark_visited(&mut self, url: &str) {
        self.visited_urls.insert(url.to_string());
    }

    pub fn visited_count(&self) -> usize {
        self.visited_urls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pool_falls_back_to_builtin_when_input_is_blank() {
        let pool = UserAgentPool::new(["", "   "]);
        assert_eq!(pool.len(), DEFAULT_USER_AGENTS.len());
    }

    #[test]
    fn pool_picks_from_custom_agents() {
        let pool = UserAgentPool::new(["agent-a", "agent-b"]);
        for _ in 0..20 {
            let ua = pool.pick();
            assert!(ua == "agent-a" || ua == "agent-b");
        }
    }

    #[test]
    fn pool_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ua-one\n\nua-two").unwrap();
        let pool = UserAgentPool::from_file_or_default(Some(file.path()));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn missing_pool_file_uses_builtin() {
        let pool = UserAgentPool::from_file_or_default(Some(Path::new("/nonexistent/ua.txt")));
        assert_eq!(pool.len(), DEFAULT_USER_AGENTS.len());
    }

    #[test]
    fn profile_keeps_fixed_hints() {
        let profile = RequestProfile::with_user_agent("ua".into());
        assert_eq!(profile.referer, "https://www.google.com/");
        assert_eq!(profile.accept_language, "en-US,en;q=0.5");
    }

    #[test]
    fn visited_set_only_grows() {
        let mut state = PaginationState::new("https://site.test/listings");
        state.mark_visited("https://site.test/listings");
        state.mark_visited("https://site.test/listings");
        assert!(state.is_visited("https://site.test/listings"));
        assert_eq!(state.visited_count(), 1);
        assert_eq!(state.current_page, 1);
    }
}
