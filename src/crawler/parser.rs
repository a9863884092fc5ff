//! HTML query layer
//!
//! This module wraps a parsed page and answers selector queries against it:
//! - element texts and attributes for the field extractor
//! - item links (absolute URLs) for frontier discovery
//!
//! Queries are pure. An invalid selector yields no matches rather than an error.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A parsed page that can be queried with CSS selectors
pub struct PageDocument {
    html: Html,
}

impl PageDocument {
    /// Parses page content
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_harvest::crawler::PageDocument;
    ///
    /// let doc = PageDocument::parse(r#"<html><body><h1> Dune </h1></body></html>"#);
    /// assert_eq!(doc.select_first_text("h1"), Some("Dune".to_string()));
    /// ```
    pub fn parse(content: &str) -> Self {
        Self {
            html: Html::parse_document(content),
        }
    }

    fn select<'a>(&'a self, selector: &str) -> Vec<ElementRef<'a>> {
        match Selector::parse(selector) {
            Ok(parsed) => self.html.select(&parsed).collect(),
            Err(e) => {
                tracing::debug!("Ignoring invalid selector {}: {:?}", selector, e);
                Vec::new()
            }
        }
    }

    /// Returns the text of every element matching `selector`, in document order
    pub fn select_texts(&self, selector: &str) -> Vec<String> {
        self.select(selector).into_iter().map(element_text).collect()
    }

    /// Returns the text of the first element matching `selector`
    pub fn select_first_text(&self, selector: &str) -> Option<String> {
        self.select(selector).into_iter().next().map(element_text)
    }

    /// Returns the `attr` value of every matching element that carries it
    pub fn select_attrs(&self, selector: &str, attr: &str) -> Vec<String> {
        self.select(selector)
            .into_iter()
            .filter_map(|element| element.value().attr(attr).map(|v| v.trim().to_string()))
            .collect()
    }

    /// Returns the `attr` value of the first matching element
    pub fn select_first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        self.select(selector)
            .into_iter()
            .next()
            .and_then(|element| element.value().attr(attr).map(|v| v.trim().to_string()))
    }

    /// Returns the text of every element inside the first `region` match
    /// that also matches `inner`
    pub fn select_texts_within(&self, region: &str, inner: &str) -> Option<Vec<String>> {
        let region_element = self.select(region).into_iter().next()?;
        let inner_selector = Selector::parse(inner).ok()?;
        Some(
            region_element
                .select(&inner_selector)
                .map(element_text)
                .collect(),
        )
    }

    /// Extracts the absolute targets of links matched by `selectors`
    ///
    /// Selectors are evaluated in order and their results concatenated;
    /// duplicates are kept, deduplication is the caller's job.
    pub fn extract_links(&self, base_url: &Url, selectors: &[String]) -> Vec<String> {
        let mut links = Vec::new();

        for selector in selectors {
            for element in self.select(selector) {
                // Skip if it has the download attribute
                if element.value().attr("download").is_some() {
                    continue;
                }

                if let Some(href) = element.value().attr("href") {
                    if let Some(absolute_url) = resolve_link(href, base_url) {
                        links.push(absolute_url);
                    }
                }
            }
        }

        links
    }
}

/// Collects an element's text nodes, trimmed and joined by single spaces
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Convenience function for extracting item links straight from page content
pub fn extract_links_simple(html: &str, base_url: &Url, selectors: &[String]) -> Vec<String> {
    PageDocument::parse(html).extract_links(base_url, selectors)
}
