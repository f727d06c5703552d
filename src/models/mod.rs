use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No Title";
pub const NO_PRICE: &str = "No Price";
pub const NO_LOCATION: &str = "No Location";

/// Value of a listing feature: either a flag (check-mark present) or a
/// textual value such as "3" bedrooms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Text(String),
}

/// One scraped property, built from a single listing card.
///
/// Missing fields resolve to the `NO_*` sentinels or `None`; a record is
/// never dropped because one field could not be found. Optional fields are
/// serialized as `null` so every declared key is always present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub title: String,
    /// Raw price text, currency symbols and separators kept as shown.
    pub price: String,
    pub location: String,
    pub description: Option<String>,
    pub features: BTreeMap<String, FeatureValue>,
    pub listing_id: Option<String>,
    pub listing_type: Option<String>,
    pub is_featured: bool,
    pub agent: Option<String>,
    /// Absolute or site-relative, as found in the card markup.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<ContactInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info_error: Option<String>,
}

impl Default for ListingRecord {
    fn default() -> Self {
        Self {
            title: NO_TITLE.to_string(),
            price: NO_PRICE.to_string(),
            location: NO_LOCATION.to_string(),
            description: None,
            features: BTreeMap::new(),
            listing_id: None,
            listing_type: None,
            is_featured: false,
            agent: None,
            url: String::new(),
            contact_info: None,
            contact_info_error: None,
        }
    }
}

impl ListingRecord {
    /// Attaches the outcome of a contact reveal. An error annotation on the
    /// contact info is mirrored into `contact_info_error`.
    pub fn enrich_with_contact(&mut self, contact: ContactInfo) {
        self.contact_info_error = contact.error.clone();
        self.contact_info = Some(contact);
    }
}

/// Agent contact details harvested from a listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContactInfo {
    pub url: String,
    pub extracted_at: Option<DateTime<Utc>>,
    pub button_clicked: bool,
    pub phone_numbers: Vec<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub possible_emails: Vec<String>,
    pub data_attributes: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl ContactInfo {
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            extracted_at: Some(Utc::now()),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phone_numbers.is_empty()
            && self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.possible_emails.is_empty()
            && self.data_attributes.is_empty()
    }
}

/// Image found on a listing detail page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingImage {
    pub url: String,
    /// High-resolution variant, when the gallery exposes one.
    pub large: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub agency: Option<String>,
    pub data_attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DetailLocation {
    pub path: Vec<String>,
    pub address: Option<String>,
}

/// Everything a single listing page exposes beyond its search-result card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingDetail {
    pub url: String,
    pub extracted_at: DateTime<Utc>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub available_from: Option<String>,
    pub property_details: BTreeMap<String, String>,
    pub main_features: BTreeMap<String, String>,
    pub features: BTreeMap<String, FeatureValue>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub images: Vec<ListingImage>,
    pub agent: AgentInfo,
    pub location: DetailLocation,
    pub structured_data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_carries_sentinels_and_null_optionals() {
        let json = serde_json::to_value(ListingRecord::default()).unwrap();
        assert_eq!(json["title"], "No Title");
        assert_eq!(json["price"], "No Price");
        assert_eq!(json["location"], "No Location");
        assert!(json.get("description").unwrap().is_null());
        assert!(json.get("listing_id").unwrap().is_null());
        assert!(json.get("agent").unwrap().is_null());
        assert_eq!(json["is_featured"], false);
        assert!(json.get("contact_info").is_none());
    }

    #[test]
    fn feature_values_serialize_untagged() {
        let mut record = ListingRecord::default();
        record
            .features
            .insert("bedrooms".into(), FeatureValue::Text("3".into()));
        record.features.insert("pool".into(), FeatureValue::Flag(true));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["features"]["bedrooms"], "3");
        assert_eq!(json["features"]["pool"], true);
    }

    #[test]
    fn enrich_mirrors_contact_error() {
        let mut record = ListingRecord::default();
        record.enrich_with_contact(ContactInfo::failed("https://x.test/1", "no button"));
        assert_eq!(record.contact_info_error.as_deref(), Some("no button"));
        assert!(record.contact_info.is_some());
    }
}
