//! Fallback field extraction
//!
//! This module turns the content of one item page into a [`BookRecord`]:
//! - each field is resolved by an ordered table of strategies (see [`strategies`])
//! - candidate values are accepted or rejected by the validators in [`validate`]
//! - a field nobody can resolve is simply absent
//!
//! A record is only produced when both title and author were found.
//! Extraction never touches the network; revealing truncated content is the
//! fetch session's job and happens before the content arrives here.

pub mod strategies;
pub mod validate;

use crate::crawler::PageDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strategies::{first_valid, DESCRIPTION_REGIONS, GENRE_FAMILIES, MAX_GENRES};

/// One extracted catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    /// Average rating in (0, 5]
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub description: Option<String>,
    /// At most five genre tags, in page order
    pub genres: Vec<String>,
}

impl BookRecord {
    /// Description length in characters, zero when absent
    pub fn description_len(&self) -> usize {
        self.description
            .as_deref()
            .map(|d| d.chars().count())
            .unwrap_or(0)
    }

    /// Genres joined for tabular output
    pub fn genres_joined(&self) -> String {
        self.genres.join(", ")
    }
}

/// Field values found on a page, before the title/author requirement is applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub description: Option<String>,
    pub genres: Vec<String>,
}

impl ExtractedFields {
    /// Converts the fields into a record if both title and author are present
    pub fn into_record(self) -> Option<BookRecord> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let author = self.author.filter(|a| !a.trim().is_empty())?;

        Some(BookRecord {
            title,
            author,
            rating: self.rating,
            rating_count: self.rating_count,
            description: self.description,
            genres: self.genres,
        })
    }
}

/// Runs every field's strategies against a parsed page
pub fn extract_fields(doc: &PageDocument) -> ExtractedFields {
    ExtractedFields {
        title: first_valid(doc, strategies::TITLE),
        author: first_valid(doc, strategies::AUTHOR),
        rating: first_valid(doc, strategies::RATING),
        rating_count: first_valid(doc, strategies::RATING_COUNT),
        description: extract_description(doc),
        genres: extract_genres(doc),
    }
}

/// Parses page content and extracts a record from it
///
/// # Example
///
/// ```
/// use catalog_harvest::extract_record;
///
/// let page = r#"<h1 data-testid="bookTitle">Dune</h1>
///               <span data-testid="name">Frank Herbert</span>"#;
/// let record = extract_record(page).unwrap();
/// assert_eq!(record.title, "Dune");
/// assert_eq!(record.rating, None);
///
/// assert!(extract_record("<h1>No author here</h1>").is_none());
/// ```
pub fn extract_record(content: &str) -> Option<BookRecord> {
    let doc = PageDocument::parse(content);
    extract_fields(&doc).into_record()
}

/// Resolves the description
///
/// A strategy hit of at least [`validate::FULL_DESCRIPTION_CHARS`] wins
/// outright. A shorter hit is replaced by the joined fragments of the
/// description region when those are longer. Without any hit the joined
/// fragments are used, and as a last resort the region's own text.
fn extract_description(doc: &PageDocument) -> Option<String> {
    let accepted = first_valid(doc, strategies::DESCRIPTION);
    let complete = accepted
        .as_ref()
        .is_some_and(|d| d.chars().count() >= validate::FULL_DESCRIPTION_CHARS);
    if complete {
        return accepted;
    }

    match (accepted, joined_region_fragments(doc)) {
        (Some(description), Some(joined))
            if joined.chars().count() > description.chars().count() =>
        {
            Some(joined)
        }
        (Some(description), _) => Some(description),
        (None, Some(joined)) => Some(joined),
        (None, None) => region_text(doc),
    }
}

/// Joins the span fragments of the first description region present
fn joined_region_fragments(doc: &PageDocument) -> Option<String> {
    let fragments = DESCRIPTION_REGIONS
        .iter()
        .find_map(|region| doc.select_texts_within(region, "span"))?;

    let joined = fragments
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn region_text(doc: &PageDocument) -> Option<String> {
    DESCRIPTION_REGIONS.iter().find_map(|region| {
        doc.select_first_text(region)
            .filter(|text| !text.trim().is_empty())
    })
}

/// Takes up to [`MAX_GENRES`] distinct tags from the first family that has any
fn extract_genres(doc: &PageDocument) -> Vec<String> {
    for family in GENRE_FAMILIES {
        let mut seen = HashSet::new();
        let genres: Vec<String> = doc
            .select_texts(family)
            .into_iter()
            .map(|g| normalize_genre(&g))
            .filter(|g| !g.is_empty() && seen.insert(g.clone()))
            .take(MAX_GENRES)
            .collect();

        if !genres.is_empty() {
            return genres;
        }
    }

    Vec::new()
}

/// Collapses whitespace and drops the space after commas inside a tag
///
/// Tabular output joins genres with ", ", so a tag must never contain that
/// separator itself.
fn normalize_genre(tag: &str) -> String {
    tag.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(", ", ",")
}
