use std::collections::BTreeMap;

use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::error::CascadeError;
use crate::models::{FeatureValue, ListingRecord, NO_LOCATION, NO_PRICE, NO_TITLE};
use crate::scrapers::cascade::{element_text, SelectorCascade};
use crate::scrapers::fields::card_url;
use crate::scrapers::traits::CardExtractor;

/// Host suffix served by [`PrefixedCardExtractor::privateproperty`].
pub const PRIVATEPROPERTY_HOST: &str = "privateproperty.co.za";

/// Sub-selectors derived from one BEM block prefix, e.g. `listing-result`.
#[derive(Debug, Clone)]
struct PrefixSelectors {
    title: SelectorCascade,
    price: SelectorCascade,
    location: SelectorCascade,
    description: SelectorCascade,
    feature: Selector,
    wishlist: SelectorCascade,
    agent: SelectorCascade,
}

impl PrefixSelectors {
    fn new(prefix: &str) -> Result<Self, CascadeError> {
        let one = |suffix: &str| SelectorCascade::new([format!(".{prefix}__{suffix}")]);
        let feature_css = format!(".{prefix}__feature");
        Ok(Self {
            title: one("title")?,
            price: one("price")?,
            location: one("address")?,
            description: one("description")?,
            feature: Selector::parse(&feature_css).map_err(|e| CascadeError {
                selector: feature_css.clone(),
                reason: e.to_string(),
            })?,
            wishlist: one("wishlist-btn")?,
            agent: SelectorCascade::new([
                format!(".{prefix}__agent-name"),
                format!(".{prefix}__advertiser"),
            ])?,
        })
    }
}

/// Card extractor for sites whose cards come in a "featured" and a
/// "standard" flavour, each with its own class-name prefix. The container's
/// class membership picks the prefix, and every sub-selector for that card
/// derives from it.
#[derive(Debug, Clone)]
pub struct PrefixedCardExtractor {
    featured_class: String,
    featured: PrefixSelectors,
    standard: PrefixSelectors,
    check_mark: Selector,
    boxed_value: Selector,
    link: SelectorCascade,
}

impl PrefixedCardExtractor {
    pub fn new(featured_prefix: &str, standard_prefix: &str) -> Result<Self, CascadeError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| CascadeError {
                selector: css.to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            featured_class: featured_prefix.to_string(),
            featured: PrefixSelectors::new(featured_prefix)?,
            standard: PrefixSelectors::new(standard_prefix)?,
            check_mark: parse("[class*='icon-check'], [class*='check-mark']")?,
            boxed_value: parse("[class*='value--boxed']")?,
            link: SelectorCascade::new(["a[href]"])?,
        })
    }

    /// Private Property (privateproperty.co.za) search results.
    pub fn privateproperty() -> Result<Self, CascadeError> {
        Self::new("featured-listing", "listing-result")
    }

    fn is_featured(&self, card: ElementRef<'_>) -> bool {
        card.value().classes().any(|c| c == self.featured_class)
    }

    /// Boxed sub-element wins, then a check mark, then the element's own text.
    fn features(&self, card: ElementRef<'_>, feature: &Selector) -> BTreeMap<String, FeatureValue> {
        let mut features = BTreeMap::new();
        for el in card.select(feature) {
            let Some(key) = el
                .value()
                .attr("title")
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
            else {
                continue;
            };

            let value = if let Some(boxed) = el.select(&self.boxed_value).next() {
                Some(FeatureValue::Text(element_text(boxed)))
            } else if el.select(&self.check_mark).next().is_some() {
                Some(FeatureValue::Flag(true))
            } else {
                let text = element_text(el);
                (!text.is_empty()).then_some(FeatureValue::Text(text))
            };

            if let Some(value) = value {
                features.insert(key, value);
            }
        }
        features
    }
}

impl CardExtractor for PrefixedCardExtractor {
    fn extract(&self, card: ElementRef<'_>) -> ListingRecord {
        let is_featured = self.is_featured(card);
        let sel = if is_featured { &self.featured } else { &self.standard };

        let wishlist = sel.wishlist.first_element(card);
        let wishlist_attr = |name: &str| {
            wishlist
                .and_then(|w| w.value().attr(name))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let record = ListingRecord {
            title: sel.title.first_text(card).unwrap_or_else(|| NO_TITLE.to_string()),
            price: sel.price.first_text(card).unwrap_or_else(|| NO_PRICE.to_string()),
            location: sel
                .location
                .first_text(card)
                .unwrap_or_else(|| NO_LOCATION.to_string()),
            description: sel.description.first_text(card),
            features: self.features(card, &sel.feature),
            listing_id: wishlist_attr("data-listing-id"),
            listing_type: wishlist_attr("data-listing-type"),
            is_featured,
            agent: sel.agent.first_text(card),
            url: card_url(card, &self.link),
            ..ListingRecord::default()
        };
        debug!(title = %record.title, featured = is_featured, "extracted privateproperty card");
        record
    }

    fn name(&self) -> &'static str {
        "privateproperty"
    }
}
