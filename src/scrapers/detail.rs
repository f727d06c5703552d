//! Full listing-page extraction, beyond what a search-result card shows.

use std::collections::BTreeMap;

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::CascadeError;
use crate::models::{AgentInfo, DetailLocation, FeatureValue, ListingDetail, ListingImage};
use crate::scrapers::cascade::{element_text, normalize_whitespace};

/// `@type` values of JSON-LD blocks that describe the property itself.
const STRUCTURED_TYPES: &[&str] = &["Residence", "Property", "Product"];

fn selector(css: &str) -> Result<Selector, CascadeError> {
    Selector::parse(css).map_err(|e| CascadeError {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Parses a listing detail page into a [`ListingDetail`].
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    title: Selector,
    price: Selector,
    available_from: Selector,
    detail_item: Selector,
    detail_name_value: Selector,
    detail_value: Selector,
    main_feature: Selector,
    feature_item: Selector,
    feature_name_value: Selector,
    feature_boxed: Selector,
    feature_check: Selector,
    headline: Selector,
    description: Selector,
    gallery_photo: Selector,
    banner_image: Selector,
    agent_name: Selector,
    agent_phone: Selector,
    agent_email: Selector,
    agency: Selector,
    contact_container: Selector,
    breadcrumb: Selector,
    address: Selector,
    json_ld: Selector,
}

impl DetailExtractor {
    pub fn new() -> Result<Self, CascadeError> {
        Ok(Self {
            title: selector(".listing-details__title")?,
            price: selector(".listing-price-display__price")?,
            available_from: selector(".listing-details__badge--available-from span")?,
            detail_item: selector(".property-details__list-item")?,
            detail_name_value: selector(".property-details__name-value")?,
            detail_value: selector(".property-details__value")?,
            main_feature: selector(".listing-details__main-feature")?,
            feature_item: selector(".property-features__list-item")?,
            feature_name_value: selector(".property-features__name-value")?,
            feature_boxed: selector(".property-features__value--boxed")?,
            feature_check: selector(".property-features__list-icon-check")?,
            headline: selector(".listing-description__headline")?,
            description: selector(".listing-description__text")?,
            gallery_photo: selector(".details-page-photogrid__photo")?,
            banner_image: selector(".media-container__image")?,
            agent_name: selector(".agent-name, .listing-details__agent-name")?,
            agent_phone: selector(".agent-phone, .agent-tel")?,
            agent_email: selector(".agent-email")?,
            agency: selector(".agency-name, .agency")?,
            contact_container: selector("#contact-form-container, .contact-form-container")?,
            breadcrumb: selector(".breadcrumb__shape-link")?,
            address: selector(".listing-details__address")?,
            json_ld: selector(r#"script[type="application/ld+json"]"#)?,
        })
    }

    pub fn extract(&self, markup: &str, url: &str) -> ListingDetail {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        let detail = ListingDetail {
            url: url.to_string(),
            extracted_at: Utc::now(),
            title: first_text(root, &self.title),
            price: first_text(root, &self.price),
            available_from: first_text(root, &self.available_from),
            property_details: self.property_details(root),
            main_features: self.main_features(root),
            features: self.features(root),
            headline: first_text(root, &self.headline),
            description: first_text(root, &self.description),
            images: self.images(root),
            agent: self.agent(root),
            location: self.location(root),
            structured_data: self.structured_data(root),
        };
        debug!(
            url,
            details = detail.property_details.len(),
            features = detail.features.len(),
            images = detail.images.len(),
            "extracted listing detail"
        );
        detail
    }

    /// "Listing Number RR123" style rows: the key is the row text with the
    /// value removed.
    fn property_details(&self, root: ElementRef<'_>) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        for item in root.select(&self.detail_item) {
            let Some(name_value) = item.select(&self.detail_name_value).next() else {
                continue;
            };
            let Some(value_el) = name_value.select(&self.detail_value).next() else {
                continue;
            };
            let value = element_text(value_el);
            let label = element_text(name_value).replacen(&value, "", 1);
            let key = clean_key(&label);
            if !key.is_empty() {
                details.insert(key, value);
            }
        }
        details
    }

    fn main_features(&self, root: ElementRef<'_>) -> BTreeMap<String, String> {
        root.select(&self.main_feature)
            .filter_map(|el| {
                let title = el.value().attr("title")?.trim();
                (!title.is_empty()).then(|| (title.to_lowercase(), element_text(el)))
            })
            .collect()
    }

    fn features(&self, root: ElementRef<'_>) -> BTreeMap<String, FeatureValue> {
        let mut features = BTreeMap::new();
        for item in root.select(&self.feature_item) {
            let Some(name_value) = item.select(&self.feature_name_value).next() else {
                continue;
            };
            // The name is the first text node; a boxed value may follow it.
            let Some(name) = name_value
                .text()
                .map(str::trim)
                .find(|t| !t.is_empty())
                .map(normalize_whitespace)
            else {
                continue;
            };

            if let Some(boxed) = item.select(&self.feature_boxed).next() {
                features.insert(name, FeatureValue::Text(element_text(boxed)));
            } else if item.select(&self.feature_check).next().is_some() {
                features.insert(name, FeatureValue::Flag(true));
            }
        }
        features
    }

    fn images(&self, root: ElementRef<'_>) -> Vec<ListingImage> {
        let gallery: Vec<ListingImage> = root
            .select(&self.gallery_photo)
            .filter_map(|img| img.value().attr("src"))
            .map(|src| ListingImage {
                url: src.to_string(),
                large: Some(src.replace("_e.jpg", "_dhd.jpg")),
            })
            .collect();
        if !gallery.is_empty() {
            return gallery;
        }

        root.select(&self.banner_image)
            .filter_map(|img| img.value().attr("src"))
            .map(|src| ListingImage {
                url: src.to_string(),
                large: None,
            })
            .collect()
    }

    fn agent(&self, root: ElementRef<'_>) -> AgentInfo {
        let data_attributes: BTreeMap<String, String> = root
            .select(&self.contact_container)
            .next()
            .map(|container| {
                container
                    .value()
                    .attrs()
                    .filter(|(name, _)| {
                        name.starts_with("data-")
                            && (name.contains("agent") || name.contains("contact"))
                    })
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        AgentInfo {
            name: first_text(root, &self.agent_name),
            phone: first_text(root, &self.agent_phone),
            email: first_text(root, &self.agent_email),
            agency: first_text(root, &self.agency),
            data_attributes,
        }
    }

    fn location(&self, root: ElementRef<'_>) -> DetailLocation {
        DetailLocation {
            path: root.select(&self.breadcrumb).map(element_text).collect(),
            address: first_text(root, &self.address),
        }
    }

    /// The first JSON-LD block describing the property. Malformed blocks are
    /// logged and skipped.
    fn structured_data(&self, root: ElementRef<'_>) -> Option<serde_json::Value> {
        root.select(&self.json_ld).find_map(|script| {
            let raw = script.text().collect::<String>();
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => {
                    let describes_property = value
                        .get("@type")
                        .and_then(|t| t.as_str())
                        .is_some_and(|t| STRUCTURED_TYPES.contains(&t));
                    describes_property.then_some(value)
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed JSON-LD block");
                    None
                }
            }
        })
    }
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Lower snake_case key with punctuation removed.
pub fn clean_key(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
    <html><head>
      <script type="application/ld+json">{ "@type": "BreadcrumbList" }</script>
      <script type="application/ld+json">{ "@type": "Residence", "name": "Oakglen flat" }</script>
      <script type="application/ld+json">{ not json</script>
    </head><body>
      <a class="breadcrumb__shape-link">Western Cape</a>
      <a class="breadcrumb__shape-link">Bellville</a>
      <h1 class="listing-details__title">2 Bedroom Apartment</h1>
      <div class="listing-price-display__price">R 9 500</div>
      <div class="listing-details__badge--available-from"><span>01 Nov 2026</span></div>
      <div class="listing-details__address">12 Oak Street</div>
      <span class="listing-details__main-feature" title="Bedrooms">2</span>
      <span class="listing-details__main-feature">no title</span>
      <ul>
        <li class="property-details__list-item">
          <div class="property-details__name-value">Listing Number
            <span class="property-details__value">RR4191874</span></div>
        </li>
        <li class="property-details__list-item">
          <div class="property-details__name-value">Pets Allowed?
            <span class="property-details__value">Yes</span></div>
        </li>
      </ul>
      <ul>
        <li class="property-features__list-item">
          <div class="property-features__name-value">Parking
            <span class="property-features__value--boxed">1</span></div>
        </li>
        <li class="property-features__list-item">
          <div class="property-features__name-value">Garden</div>
          <span class="property-features__list-icon-check"></span>
        </li>
        <li class="property-features__list-item">
          <div class="property-features__name-value">Unknown</div>
        </li>
      </ul>
      <h2 class="listing-description__headline">Lovely  flat</h2>
      <div class="listing-description__text">Close to shops.</div>
      <img class="details-page-photogrid__photo" src="https://img.test/a_e.jpg">
      <img class="details-page-photogrid__photo" src="https://img.test/b_e.jpg">
      <img class="media-container__image" src="https://img.test/banner.jpg">
      <span class="listing-details__agent-name">Jane Agent</span>
      <span class="agency-name">Oak Realty</span>
      <div id="contact-form-container" data-agent-id="42" data-contact-phone="0215550100" data-theme="dark"></div>
    </body></html>"#;

    fn extract() -> ListingDetail {
        DetailExtractor::new()
            .unwrap()
            .extract(DETAIL_PAGE, "https://www.privateproperty.co.za/to-rent/RR4191874")
    }

    #[test]
    fn basics_and_description() {
        let detail = extract();
        assert_eq!(detail.title.as_deref(), Some("2 Bedroom Apartment"));
        assert_eq!(detail.price.as_deref(), Some("R 9 500"));
        assert_eq!(detail.available_from.as_deref(), Some("01 Nov 2026"));
        assert_eq!(detail.headline.as_deref(), Some("Lovely flat"));
        assert_eq!(detail.description.as_deref(), Some("Close to shops."));
    }

    #[test]
    fn property_details_are_keyed_by_cleaned_label() {
        let detail = extract();
        assert_eq!(detail.property_details["listing_number"], "RR4191874");
        assert_eq!(detail.property_details["pets_allowed"], "Yes");
        assert_eq!(detail.main_features.len(), 1);
        assert_eq!(detail.main_features["bedrooms"], "2");
    }

    #[test]
    fn features_distinguish_boxed_and_checked() {
        let detail = extract();
        assert_eq!(detail.features["Parking"], FeatureValue::Text("1".into()));
        assert_eq!(detail.features["Garden"], FeatureValue::Flag(true));
        assert!(!detail.features.contains_key("Unknown"));
    }

    #[test]
    fn gallery_images_get_large_variant_and_suppress_banner() {
        let detail = extract();
        assert_eq!(detail.images.len(), 2);
        assert_eq!(detail.images[0].url, "https://img.test/a_e.jpg");
        assert_eq!(detail.images[0].large.as_deref(), Some("https://img.test/a_dhd.jpg"));
    }

    #[test]
    fn banner_images_used_without_gallery() {
        let page = r#"<img class="media-container__image" src="https://img.test/banner.jpg">"#;
        let detail = DetailExtractor::new().unwrap().extract(page, "https://x.test/1");
        assert_eq!(detail.images.len(), 1);
        assert!(detail.images[0].large.is_none());
    }

    #[test]
    fn agent_location_and_structured_data() {
        let detail = extract();
        assert_eq!(detail.agent.name.as_deref(), Some("Jane Agent"));
        assert_eq!(detail.agent.agency.as_deref(), Some("Oak Realty"));
        assert_eq!(detail.agent.data_attributes["data-agent-id"], "42");
        assert!(detail.agent.data_attributes.contains_key("data-contact-phone"));
        assert!(!detail.agent.data_attributes.contains_key("data-theme"));

        assert_eq!(detail.location.path, vec!["Western Cape", "Bellville"]);
        assert_eq!(detail.location.address.as_deref(), Some("12 Oak Street"));

        let data = detail.structured_data.unwrap();
        assert_eq!(data["name"], "Oakglen flat");
    }

    #[test]
    fn first_qualifying_json_ld_block_wins() {
        let page = r#"<html><head>
          <script type="application/ld+json">{"@type": "Organization", "name": "agency"}</script>
          <script type="application/ld+json">{not json</script>
          <script type="application/ld+json">{"@type": "Residence", "name": "first"}</script>
          <script type="application/ld+json">{"@type": "Product", "name": "second"}</script>
        </head><body></body></html>"#;
        let detail = DetailExtractor::new().unwrap().extract(page, "https://x.test/1");
        assert_eq!(detail.structured_data.unwrap()["name"], "first");
    }

    #[test]
    fn clean_key_strips_punctuation() {
        assert_eq!(clean_key(" Pets Allowed? "), "pets_allowed");
        assert_eq!(clean_key("Floor-size (m2)"), "floorsize_m2");
    }
}
