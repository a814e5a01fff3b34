//! Shared HTML helpers built on `scraper`.

use scraper::{ElementRef, Selector};

use crate::{Error, Result};

/// Compiles a CSS selector, mapping failures to [`Error::Parse`].
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("Failed to parse selector: {:?}", e)))
}

/// Returns the whitespace-normalised text of an element.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Returns the normalised text of the first descendant matching `selector`.
pub(crate) fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty())
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
