//! Listing scraper: two-tier fetching, paginated walks and cascade-based
//! field extraction for property-listing sites.

pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod service;
pub mod session;
pub mod store;

pub use config::ScraperConfig;
pub use error::{BrowserError, CascadeError, ConfigError, FetchError, SetupError, StoreError};
pub use models::{ContactInfo, FeatureValue, ListingDetail, ListingRecord};
pub use service::{ScrapeMode, ScrapeRequest, ScrapeResponse, Scraper};
pub use session::{ScrapeSession, SessionPolicy, SessionReport, StopReason};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
