//! Revealing and harvesting agent contact details on a live listing page.
//!
//! Contact info is enrichment: every failure here degrades to a partial or
//! empty [`ContactInfo`] carrying an `error` note, never an `Err`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::error::SetupError;
use crate::models::ContactInfo;
use crate::scrapers::cascade::SelectorCascade;
use crate::scrapers::traits::{ElementSnapshot, LivePage};

/// Optional country code, one or two 3-digit groups, then two 3-4 digit groups.
pub const PHONE_PATTERN: &str =
    r"(?:\+\d{1,3}[-.\s]?)?(?:\(?\d{3}\)?[-.\s]?){1,2}\d{3,4}[-.\s]?\d{3,4}";
pub const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";
pub const MIN_PHONE_DIGITS: usize = 9;
pub const MAX_MATCHES: usize = 3;

const MODAL_SELECTORS: &str = "dialog[open], div[role='dialog'], .modal--open, .dialog--open";
const CONTACT_CONTAINER: &str = "#contact-form-container, .contact-form-container";

/// Finds phone-number-shaped tokens in free text.
#[derive(Debug, Clone)]
pub struct PhoneMatcher {
    pattern: Regex,
}

impl PhoneMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(PHONE_PATTERN)?,
        })
    }

    /// Up to [`MAX_MATCHES`] distinct matches with at least
    /// [`MIN_PHONE_DIGITS`] digits, in order of appearance.
    pub fn find(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for m in self.pattern.find_iter(text) {
            let token = m.as_str().trim();
            let digits = token.chars().filter(char::is_ascii_digit).count();
            if digits >= MIN_PHONE_DIGITS && !found.iter().any(|f| f == token) {
                found.push(token.to_string());
                if found.len() == MAX_MATCHES {
                    break;
                }
            }
        }
        found
    }
}

/// How a reveal control is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStrategy {
    /// A button whose visible text is exactly the reveal label.
    ExactText,
    /// An outlined button whose text mentions the number.
    ClassAndText,
    /// A button with an icon whose text offers to show contact details.
    IconAndText,
}

struct RevealLocator {
    strategy: RevealStrategy,
    css: &'static str,
    accepts: fn(&str) -> bool,
}

const REVEAL_LOCATORS: &[RevealLocator] = &[
    RevealLocator {
        strategy: RevealStrategy::ExactText,
        css: "button",
        accepts: |text| text.trim().eq_ignore_ascii_case("Show contact number"),
    },
    RevealLocator {
        strategy: RevealStrategy::ClassAndText,
        css: "button.btn.outline",
        accepts: |text| text.contains("Show contact number") || text.contains("Show number"),
    },
    RevealLocator {
        strategy: RevealStrategy::IconAndText,
        css: "button:has(svg)",
        accepts: |text| {
            let lower = text.to_lowercase();
            text.contains("Show") && (lower.contains("contact") || lower.contains("number"))
        },
    },
];

/// Clicks a "show contact" control and harvests name, phone and email.
#[derive(Debug, Clone)]
pub struct ContactRevealer {
    phones: PhoneMatcher,
    email: Regex,
    phone_fields: SelectorCascade,
    email_fields: SelectorCascade,
    name_fields: SelectorCascade,
    contact_container: Selector,
    settle: Duration,
}

impl ContactRevealer {
    pub fn new(settle: Duration) -> Result<Self, SetupError> {
        Ok(Self {
            phones: PhoneMatcher::new()?,
            email: Regex::new(EMAIL_PATTERN)?,
            phone_fields: SelectorCascade::new([
                ".agent-phone",
                ".contact-number",
                ".phone-number",
                ".agent-tel",
                ".listing-contact__phone",
                "[data-agent-phone]",
                ".agent-details__phone",
            ])?,
            email_fields: SelectorCascade::new([
                ".agent-email",
                ".contact-email",
                ".listing-contact__email",
                "[data-agent-email]",
                ".agent-details__email",
            ])?,
            name_fields: SelectorCascade::new([
                ".agent-name",
                ".contact-name",
                ".listing-agent-name",
                ".agent-details__name",
            ])?,
            contact_container: Selector::parse(CONTACT_CONTAINER).map_err(|e| {
                crate::error::CascadeError {
                    selector: CONTACT_CONTAINER.to_string(),
                    reason: e.to_string(),
                }
            })?,
            settle,
        })
    }

    /// Locates and clicks the reveal control, then harvests whatever
    /// contact details the page exposes. Without a control, the unmodified
    /// page is still searched.
    pub async fn reveal(&self, page: &dyn LivePage, timeout: Duration) -> ContactInfo {
        let url = page.current_url().unwrap_or_default();
        if let Err(e) = page.wait_for("body", timeout) {
            warn!(url = %url, error = %e, "listing page did not load");
            return ContactInfo::failed(&url, e.to_string());
        }

        let strategy = self.click_reveal_control(page);
        if let Some(strategy) = strategy {
            info!(?strategy, "clicked reveal control");
            tokio::time::sleep(self.settle).await;
        } else {
            debug!(url = %url, "no reveal control found, searching page as-is");
        }

        let mut info = ContactInfo {
            url: url.clone(),
            extracted_at: Some(Utc::now()),
            button_clicked: strategy.is_some(),
            ..ContactInfo::default()
        };
        let mut problems = Vec::new();

        let modal_text = page.texts(MODAL_SELECTORS).unwrap_or_default().join("\n");
        info.phone_numbers = self.phones.find(&modal_text);
        if info.phone_numbers.is_empty() {
            match page.text() {
                Ok(text) => info.phone_numbers = self.phones.find(&text),
                Err(e) => problems.push(format!("page text unavailable: {e}")),
            }
        }

        match page.html() {
            Ok(html) => self.harvest_markup(&html, &mut info),
            Err(e) => problems.push(format!("page markup unavailable: {e}")),
        }

        if info.is_empty() {
            problems.push(if info.button_clicked {
                "reveal control clicked but no contact details found".to_string()
            } else {
                "no reveal control found and no contact details in page".to_string()
            });
        }
        if !problems.is_empty() {
            info.error = Some(problems.join("; "));
        }

        info!(
            url = %url,
            phones = info.phone_numbers.len(),
            email = info.email.is_some(),
            "contact extraction finished"
        );
        info
    }

    fn click_reveal_control(&self, page: &dyn LivePage) -> Option<RevealStrategy> {
        REVEAL_LOCATORS.iter().find_map(|locator| {
            let accept = |el: &ElementSnapshot| !el.disabled && (locator.accepts)(&el.text);
            match page.click_first(locator.css, &accept) {
                Ok(true) => Some(locator.strategy),
                Ok(false) => None,
                Err(e) => {
                    warn!(strategy = ?locator.strategy, error = %e, "reveal click failed");
                    None
                }
            }
        })
    }

    /// Dedicated sub-selectors, container data attributes and email tokens.
    fn harvest_markup(&self, html: &str, info: &mut ContactInfo) {
        let document = Html::parse_document(html);
        let root = document.root_element();

        info.name = self.name_fields.first_text(root);
        info.phone = self
            .phone_fields
            .first_text(root)
            .or_else(|| self.phone_fields.first_attr(root, "data-agent-phone"));
        info.email = self
            .email_fields
            .first_text(root)
            .or_else(|| self.email_fields.first_attr(root, "data-agent-email"));

        if let Some(container) = document.select(&self.contact_container).next() {
            info.data_attributes = container
                .value()
                .attrs()
                .filter_map(|(name, value)| {
                    name.strip_prefix("data-")
                        .map(|key| (key.to_string(), value.to_string()))
                })
                .collect::<BTreeMap<_, _>>();
        }

        if info.email.is_none() {
            let mut emails: Vec<String> = Vec::new();
            for m in self.email.find_iter(html) {
                let email = m.as_str().to_string();
                if !emails.contains(&email) {
                    emails.push(email);
                }
                if emails.len() == MAX_MATCHES {
                    break;
                }
            }
            info.possible_emails = emails;
        }
    }
}
