//! Generic field extraction for listing cards of unknown sites.

use scraper::ElementRef;

use crate::error::CascadeError;
use crate::models::{ListingRecord, NO_LOCATION, NO_PRICE, NO_TITLE};
use crate::scrapers::cascade::SelectorCascade;
use crate::scrapers::traits::CardExtractor;

/// Per-field cascades used when no site-specific extractor applies.
#[derive(Debug, Clone)]
pub struct GenericCardExtractor {
    title: SelectorCascade,
    price: SelectorCascade,
    location: SelectorCascade,
    description: SelectorCascade,
    link: SelectorCascade,
}

impl GenericCardExtractor {
    pub fn new() -> Result<Self, CascadeError> {
        Ok(Self {
            title: SelectorCascade::new([".property-title", ".listing-title", "h2", "h3"])?,
            price: SelectorCascade::new([".property-price", ".listing-price", ".price"])?,
            location: SelectorCascade::new([
                ".property-location",
                ".listing-location",
                ".address",
            ])?,
            description: SelectorCascade::new([
                ".property-description",
                ".listing-description",
                ".description",
            ])?,
            link: SelectorCascade::new(["a[href]"])?,
        })
    }
}

impl CardExtractor for GenericCardExtractor {
    fn extract(&self, card: ElementRef<'_>) -> ListingRecord {
        ListingRecord {
            title: self.title.first_text(card).unwrap_or_else(|| NO_TITLE.to_string()),
            price: self.price.first_text(card).unwrap_or_else(|| NO_PRICE.to_string()),
            location: self
                .location
                .first_text(card)
                .unwrap_or_else(|| NO_LOCATION.to_string()),
            description: self.description.first_text(card),
            url: card_url(card, &self.link),
            ..ListingRecord::default()
        }
    }

    fn name(&self) -> &'static str {
        "generic"
    }
}

/// The card's own `href` when it is an anchor, else the first link inside.
pub(crate) fn card_url(card: ElementRef<'_>, link: &SelectorCascade) -> String {
    card.value()
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| link.first_attr(card, "href"))
        .unwrap_or_default()
}
