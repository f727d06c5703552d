//! Locating listing cards on a results page and dispatching them to the
//! extractor registered for the page's host.

use std::sync::Arc;

use scraper::Html;
use tracing::{debug, info, warn};

use crate::error::CascadeError;
use crate::models::ListingRecord;
use crate::scrapers::cascade::{CascadeSpec, SelectorCascade};
use crate::scrapers::fields::GenericCardExtractor;
use crate::scrapers::privateproperty::{PrefixedCardExtractor, PRIVATEPROPERTY_HOST};
use crate::scrapers::traits::CardExtractor;

/// Card-container cascade, site-specific entries first.
pub const DEFAULT_CARD_SELECTORS: &[&str] = &[
    ".featured-listing, .listing-result",
    ".property-card",
    ".listing-item",
    "[data-testid='property-card']",
    ".result-card",
    "div[itemtype='http://schema.org/Product']",
    ".property",
    ".real-estate-item",
    ".card",
    "article",
    ".grid-item",
];

/// Outcome of scanning a page for listing cards.
#[derive(Debug, Clone, PartialEq)]
pub enum PageExtraction {
    /// Some cascade entry matched; `records` has one entry per card.
    Cards {
        selector: String,
        records: Vec<ListingRecord>,
    },
    /// No card selector matched anywhere on the page.
    NoCards,
}

impl PageExtraction {
    pub fn into_records(self) -> Option<Vec<ListingRecord>> {
        match self {
            Self::Cards { records, .. } => Some(records),
            Self::NoCards => None,
        }
    }
}

type HostPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Maps host predicates to card extractors, with a default fallback.
pub struct ExtractorRegistry {
    entries: Vec<(HostPredicate, Arc<dyn CardExtractor>)>,
    fallback: Arc<dyn CardExtractor>,
}

impl ExtractorRegistry {
    pub fn new(fallback: Arc<dyn CardExtractor>) -> Self {
        Self {
            entries: Vec::new(),
            fallback,
        }
    }

    /// Generic fallback plus the Private Property extractor.
    pub fn with_defaults() -> Result<Self, CascadeError> {
        let mut registry = Self::new(Arc::new(GenericCardExtractor::new()?));
        registry.register_host(
            PRIVATEPROPERTY_HOST,
            Arc::new(PrefixedCardExtractor::privateproperty()?),
        );
        Ok(registry)
    }

    pub fn register<F>(&mut self, predicate: F, extractor: Arc<dyn CardExtractor>)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.entries.push((Box::new(predicate), extractor));
    }

    /// Matches `host` and any of its subdomains.
    pub fn register_host(&mut self, host: &str, extractor: Arc<dyn CardExtractor>) {
        let host = host.to_ascii_lowercase();
        self.register(
            move |candidate| candidate == host || candidate.ends_with(&format!(".{host}")),
            extractor,
        );
    }

    pub fn resolve(&self, page_url: &str) -> &dyn CardExtractor {
        let host = url::Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
        host.and_then(|h| {
            self.entries
                .iter()
                .find(|(matches, _)| matches(&h))
                .map(|(_, extractor)| extractor.as_ref())
        })
        .unwrap_or(self.fallback.as_ref())
    }
}

/// Finds the repeated listing cards on a page and extracts each one.
pub struct PageExtractor {
    cards: SelectorCascade,
    registry: ExtractorRegistry,
}

impl PageExtractor {
    pub fn new(cards: SelectorCascade, registry: ExtractorRegistry) -> Self {
        Self { cards, registry }
    }

    pub fn with_defaults() -> Result<Self, CascadeError> {
        Self::from_spec(&CascadeSpec::from_strs(DEFAULT_CARD_SELECTORS))
    }

    pub fn from_spec(cards: &CascadeSpec) -> Result<Self, CascadeError> {
        Ok(Self::new(cards.compile()?, ExtractorRegistry::with_defaults()?))
    }

    pub fn extract(&self, markup: &str, page_url: &str) -> PageExtraction {
        self.extract_document(&Html::parse_document(markup), page_url)
    }

    pub fn extract_document(&self, document: &Html, page_url: &str) -> PageExtraction {
        let Some((entry, cards)) = self.cards.first_match(document.root_element()) else {
            warn!(url = page_url, "no listing cards found with any selector");
            return PageExtraction::NoCards;
        };

        // Host dispatch happens once per page, not per card.
        let extractor = self.registry.resolve(page_url);
        info!(
            url = page_url,
            selector = entry.raw(),
            cards = cards.len(),
            extractor = extractor.name(),
            "found listing cards"
        );

        let records: Vec<ListingRecord> = cards
            .into_iter()
            .map(|card| extractor.extract(card))
            .inspect(|record| debug!(title = %record.title, "extracted listing"))
            .collect();

        PageExtraction::Cards {
            selector: entry.raw().to_string(),
            records,
        }
    }
}
