//! Ordered selector cascades.
//!
//! A cascade is a list of CSS selectors tried in order; the first entry that
//! matches anything wins. Order encodes priority: known-good site-specific
//! selectors come before generic fallbacks, so a cascade must never be
//! reordered or deduplicated.
//!
//! Entries may carry a trailing `:contains('text')` pseudo-class, which is
//! not CSS. It is split off at construction and applied as a filter on the
//! matched element's text.

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::error::CascadeError;

/// One candidate selector of a cascade.
#[derive(Debug, Clone)]
pub struct CascadeEntry {
    raw: String,
    css: String,
    selector: Selector,
    contains: Option<String>,
}

impl CascadeEntry {
    pub fn parse(raw: &str) -> Result<Self, CascadeError> {
        let (css, contains) = split_contains(raw);
        let selector = Selector::parse(&css).map_err(|e| CascadeError {
            selector: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            css,
            selector,
            contains,
        })
    }

    /// The entry as configured, including any `:contains` suffix.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The plain CSS part, usable by a browser engine.
    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn contains(&self) -> Option<&str> {
        self.contains.as_deref()
    }

    /// Whether `text` passes this entry's `:contains` filter.
    pub fn accepts_text(&self, text: &str) -> bool {
        self.contains
            .as_deref()
            .map_or(true, |needle| text.contains(needle))
    }

    pub fn matches<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        root.select(&self.selector)
            .filter(|el| self.accepts_text(&element_text(*el)))
            .collect()
    }
}

/// Ordered list of selectors, first structural match wins.
#[derive(Debug, Clone)]
pub struct SelectorCascade {
    entries: Vec<CascadeEntry>,
}

impl SelectorCascade {
    pub fn new<I, S>(selectors: I) -> Result<Self, CascadeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = selectors
            .into_iter()
            .map(|s| CascadeEntry::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CascadeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the first entry that matches at least one element under
    /// `root`, together with all of its matches.
    pub fn first_match<'a>(
        &self,
        root: ElementRef<'a>,
    ) -> Option<(&CascadeEntry, Vec<ElementRef<'a>>)> {
        self.entries.iter().find_map(|entry| {
            let found = entry.matches(root);
            (!found.is_empty()).then_some((entry, found))
        })
    }

    pub fn first_element<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.first_match(root)
            .and_then(|(_, found)| found.into_iter().next())
    }

    /// First non-empty normalized text across the cascade.
    pub fn first_text(&self, root: ElementRef<'_>) -> Option<String> {
        self.entries.iter().find_map(|entry| {
            entry
                .matches(root)
                .into_iter()
                .map(element_text)
                .find(|text| !text.is_empty())
        })
    }

    /// First non-empty value of `attr` across the cascade.
    pub fn first_attr(&self, root: ElementRef<'_>, attr: &str) -> Option<String> {
        self.entries.iter().find_map(|entry| {
            entry.matches(root).into_iter().find_map(|el| {
                el.value()
                    .attr(attr)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
        })
    }
}

/// Serializable form of a cascade, used in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CascadeSpec(pub Vec<String>);

impl CascadeSpec {
    pub fn from_strs(selectors: &[&str]) -> Self {
        Self(selectors.iter().map(|s| (*s).to_string()).collect())
    }

    pub fn compile(&self) -> Result<SelectorCascade, CascadeError> {
        SelectorCascade::new(&self.0)
    }
}

/// Concatenated text of an element with whitespace runs collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_contains(raw: &str) -> (String, Option<String>) {
    const MARKER: &str = ":contains(";
    if let Some(idx) = raw.find(MARKER) {
        let rest = &raw[idx + MARKER.len()..];
        if let Some(arg) = rest.trim_end().strip_suffix(')') {
            let needle = arg.trim().trim_matches(|c| c == '\'' || c == '"');
            let css = raw[..idx].trim();
            let css = if css.is_empty() { "*" } else { css };
            return (css.to_string(), Some(needle.to_string()));
        }
    }
    (raw.trim().to_string(), None)
}
