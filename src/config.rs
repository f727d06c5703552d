//! JSON configuration for a scrape run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::scrapers::cascade::CascadeSpec;
use crate::scrapers::fetch::RenderTiming;
use crate::scrapers::types::UserAgentPool;
use crate::session::{DelayRange, SessionPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "scraper_config.json";
pub const DEFAULT_TARGET_URL: &str = "https://www.privateproperty.co.za/to-rent/western-cape/cape-town/55";
pub const DEFAULT_MAX_PAGES: u32 = 3;
pub const DEFAULT_OUTPUT_FILE: &str = "properties.json";

/// Inclusive millisecond range for a randomized delay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayMs {
    pub min: u64,
    pub max: u64,
}

impl DelayMs {
    fn to_range(self) -> DelayRange {
        DelayRange {
            min: Duration::from_millis(self.min),
            max: Duration::from_millis(self.max),
        }
    }
}

fn default_jitter() -> DelayMs {
    DelayMs { min: 2000, max: 5000 }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScraperConfig {
    pub target_url: String,
    /// `null` walks until pagination ends.
    pub max_pages: Option<u32>,
    pub output_file: PathBuf,
    pub max_retries: u32,
    pub save_every: u32,
    pub page_delay_ms: DelayMs,
    pub retry_delay_ms: DelayMs,
    pub request_timeout_secs: u64,
    pub render_settle_ms: u64,
    pub click_settle_ms: u64,
    pub max_forced_advances: u32,
    pub headless: bool,
    /// One user agent per line; the built-in pool is used when absent.
    pub user_agents_file: Option<PathBuf>,
    /// Overrides the built-in card-container cascade.
    pub card_selectors: Option<CascadeSpec>,
    /// Overrides the built-in "next page" cascade.
    pub pagination_selectors: Option<CascadeSpec>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            max_pages: Some(DEFAULT_MAX_PAGES),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            max_retries: 3,
            save_every: 3,
            page_delay_ms: default_jitter(),
            retry_delay_ms: default_jitter(),
            request_timeout_secs: 20,
            render_settle_ms: 5000,
            click_settle_ms: 3000,
            max_forced_advances: 5,
            headless: true,
            user_agents_file: None,
            card_selectors: None,
            pagination_selectors: None,
        }
    }
}

impl ScraperConfig {
    /// Reads and validates `path`. Any failure falls back to the built-in
    /// defaults with a warning; a run always gets a usable config.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                info!(path = %path.display(), target = %config.target_url, "loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        url::Url::parse(&self.target_url).map_err(|e| invalid("target_url", &e.to_string()))?;
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "must be at least 1"));
        }
        if self.max_forced_advances == 0 {
            return Err(invalid("max_forced_advances", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be positive"));
        }
        for (key, delay) in [("page_delay_ms", self.page_delay_ms), ("retry_delay_ms", self.retry_delay_ms)] {
            if delay.min > delay.max {
                return Err(invalid(key, "min exceeds max"));
            }
        }
        if self.output_file.as_os_str().is_empty() {
            return Err(invalid("output_file", "must not be empty"));
        }
        Ok(())
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            max_pages: self.max_pages,
            max_retries: self.max_retries,
            save_every: self.save_every,
            page_delay: self.page_delay_ms.to_range(),
            retry_delay: self.retry_delay_ms.to_range(),
            max_forced_advances: self.max_forced_advances,
        }
    }

    pub fn render_timing(&self) -> RenderTiming {
        RenderTiming {
            settle: Duration::from_millis(self.render_settle_ms),
            click_settle: Duration::from_millis(self.click_settle_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn user_agents(&self) -> UserAgentPool {
        UserAgentPool::from_file_or_default(self.user_agents_file.as_deref())
    }
}
