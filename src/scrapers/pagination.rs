//! "Next page" detection and URL resolution.
//!
//! Resolution order for the next URL:
//! 1. the `href` of an enabled "next" control, resolved against the current URL;
//! 2. a synthesized URL with the `page` query parameter set to `current + 1`.
//!
//! The second step always yields a URL, so a session can make progress even
//! on pages that expose no usable pagination markup.

use std::time::Duration;

use scraper::{ElementRef, Html};
use tracing::{debug, info};
use url::Url;

use crate::error::CascadeError;
use crate::scrapers::cascade::{CascadeSpec, SelectorCascade};
use crate::scrapers::traits::{ElementSnapshot, LivePage};

pub const DEFAULT_PAGINATION_SELECTORS: &[&str] = &[
    ".paging a.next",
    ".pagination-next",
    ".pagination a[rel='next']",
    ".pagination-container .next",
    "a.next-page",
    "a[aria-label='Next page']",
    "a:contains('Next')",
    "a:contains('>')",
    ".pager-next a",
    "[data-testid='pagination-next']",
];

#[derive(Debug, Clone)]
pub struct PaginationNavigator {
    cascade: SelectorCascade,
}

impl PaginationNavigator {
    pub fn new(cascade: SelectorCascade) -> Self {
        Self { cascade }
    }

    pub fn with_defaults() -> Result<Self, CascadeError> {
        Self::from_spec(&CascadeSpec::from_strs(DEFAULT_PAGINATION_SELECTORS))
    }

    pub fn from_spec(spec: &CascadeSpec) -> Result<Self, CascadeError> {
        Ok(Self::new(spec.compile()?))
    }

    /// Whether any cascade entry matches an enabled "next" control.
    pub fn has_next(&self, document: &Html) -> bool {
        self.enabled_controls(document).next().is_some()
    }

    /// URL of the next page; never fails, see the module docs.
    pub fn next_url(&self, document: &Html, current_url: &str, current_page: u32) -> String {
        if let Some(url) = self.linked_next_url(document, current_url) {
            return url;
        }
        let synthesized = synthesize_next_url(current_url, current_page);
        debug!(url = %synthesized, "no usable next link, synthesized page URL");
        synthesized
    }

    /// Resolved `href` of the first enabled control that carries one.
    pub fn linked_next_url(&self, document: &Html, current_url: &str) -> Option<String> {
        self.enabled_controls(document).find_map(|control| {
            let href = control.value().attr("href")?.trim();
            resolve_href(current_url, href)
        })
    }

    /// Clicks the first enabled "next" control on a live page and reports the
    /// new URL, but only if the click actually navigated.
    pub async fn next_via_click(&self, page: &dyn LivePage, settle: Duration) -> Option<String> {
        let before = page.current_url().ok()?;
        for entry in self.cascade.entries() {
            let accept =
                |el: &ElementSnapshot| !snapshot_is_disabled(el) && entry.accepts_text(&el.text);
            match page.click_first(entry.css(), &accept) {
                Ok(true) => {
                    info!(selector = entry.raw(), "clicked next-page control");
                    tokio::time::sleep(settle).await;
                    let after = page.current_url().ok()?;
                    if after != before {
                        return Some(after);
                    }
                    debug!(url = %before, "click did not change the page URL");
                    return None;
                }
                Ok(false) => {}
                Err(e) => debug!(selector = entry.raw(), error = %e, "next-page click failed"),
            }
        }
        None
    }

    fn enabled_controls<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        let root = document.root_element();
        self.cascade
            .entries()
            .iter()
            .flat_map(move |entry| entry.matches(root))
            .filter(|control| !is_disabled(*control))
    }
}

/// Sets `page={current_page + 1}` on `current_url`, replacing an existing
/// `page` parameter or appending one with `&` or `?` as appropriate.
pub fn synthesize_next_url(current_url: &str, current_page: u32) -> String {
    let next = current_page.saturating_add(1);
    let (base, fragment) = match current_url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (current_url, None),
    };

    let url = match base.split_once('?') {
        Some((path, query)) => {
            let mut replaced = false;
            let pairs: Vec<String> = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    if pair == "page" || pair.starts_with("page=") {
                        replaced = true;
                        format!("page={next}")
                    } else {
                        pair.to_string()
                    }
                })
                .collect();
            let query = pairs.join("&");
            if replaced {
                format!("{path}?{query}")
            } else if query.is_empty() {
                format!("{path}?page={next}")
            } else {
                format!("{path}?{query}&page={next}")
            }
        }
        None => format!("{base}?page={next}"),
    };

    match fragment {
        Some(fragment) => format!("{url}#{fragment}"),
        None => url,
    }
}

fn resolve_href(current_url: &str, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match Url::parse(current_url) {
        Ok(base) => base.join(href).ok().map(String::from),
        Err(_) => Url::parse(href).ok().map(String::from),
    }
}

fn is_disabled(control: ElementRef<'_>) -> bool {
    let el = control.value();
    el.attr("disabled").is_some()
        || el.classes().any(|c| c == "disabled")
        || el.attr("aria-disabled") == Some("true")
}

fn snapshot_is_disabled(snapshot: &ElementSnapshot) -> bool {
    snapshot.disabled || snapshot.has_class("disabled")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav() -> PaginationNavigator {
        PaginationNavigator::with_defaults().unwrap()
    }

    #[test]
    fn root_relative_href_resolves_against_origin() {
        let doc = Html::parse_document(r#"<div class="paging"><a class="next" href="/page/2">Next</a></div>"#);
        assert!(nav().has_next(&doc));
        assert_eq!(
            nav().next_url(&doc, "https://site.test/listings", 1),
            "https://site.test/page/2"
        );
    }

    #[test]
    fn absolute_href_is_returned_as_is() {
        let doc = Html::parse_document(r#"<a class="next-page" href="https://other.test/p?page=3">more</a>"#);
        assert_eq!(
            nav().next_url(&doc, "https://site.test/listings", 2),
            "https://other.test/p?page=3"
        );
    }

    #[test]
    fn missing_control_appends_page_parameter() {
        let doc = Html::parse_document("<p>nothing here</p>");
        assert!(!nav().has_next(&doc));
        assert_eq!(
            nav().next_url(&doc, "https://site.test/listings?region=55", 1),
            "https://site.test/listings?region=55&page=2"
        );
        assert_eq!(
            nav().next_url(&doc, "https://site.test/listings", 1),
            "https://site.test/listings?page=2"
        );
    }

    #[test]
    fn existing_page_parameter_is_replaced() {
        assert_eq!(
            synthesize_next_url("https://site.test/l?page=4&sort=new", 4),
            "https://site.test/l?page=5&sort=new"
        );
        assert_eq!(
            synthesize_next_url("https://site.test/l?page=2#top", 2),
            "https://site.test/l?page=3#top"
        );
    }

    #[test]
    fn disabled_controls_do_not_count() {
        let by_class = Html::parse_document(r#"<div class="paging"><a class="next disabled" href="/p/3">Next</a></div>"#);
        assert!(!nav().has_next(&by_class));

        let by_attr = Html::parse_document(r#"<button class="pagination-next" disabled>Next</button>"#);
        assert!(!nav().has_next(&by_attr));
    }

    #[test]
    fn text_entry_matches_next_link() {
        let doc = Html::parse_document(r#"<nav><a href="?page=2">Next page</a></nav>"#);
        assert!(nav().has_next(&doc));
        assert_eq!(
            nav().next_url(&doc, "https://site.test/listings?page=1", 1),
            "https://site.test/listings?page=2"
        );
    }

    #[test]
    fn fragment_only_href_falls_back_to_synthesis() {
        let doc = Html::parse_document(r##"<a class="next-page" href="#">Next</a>"##);
        assert_eq!(
            nav().next_url(&doc, "https://site.test/listings", 3),
            "https://site.test/listings?page=4"
        );
    }
}
