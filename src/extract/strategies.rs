//! Ordered extraction strategies per field
//!
//! Every field owns a list of `(selector, source, validator)` entries that are
//! tried top to bottom. Adding a strategy means adding a row to a table.

use crate::crawler::PageDocument;
use crate::extract::validate;

/// Where a strategy reads its candidate value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The element's text content
    Text,
    /// The named attribute of the element
    Attr(&'static str),
}

/// Which matched elements a strategy considers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the first matching element
    First,
    /// Every matching element, in document order
    All,
}

/// One fallback strategy for a field of type `T`
pub struct Strategy<T: 'static> {
    pub selector: &'static str,
    pub source: Source,
    pub scope: Scope,
    pub validator: fn(&str) -> Option<T>,
}

impl<T: 'static> Strategy<T> {
    const fn first_text(selector: &'static str, validator: fn(&str) -> Option<T>) -> Self {
        Self {
            selector,
            source: Source::Text,
            scope: Scope::First,
            validator,
        }
    }

    const fn all_text(selector: &'static str, validator: fn(&str) -> Option<T>) -> Self {
        Self {
            selector,
            source: Source::Text,
            scope: Scope::All,
            validator,
        }
    }

    const fn first_attr(
        selector: &'static str,
        attr: &'static str,
        validator: fn(&str) -> Option<T>,
    ) -> Self {
        Self {
            selector,
            source: Source::Attr(attr),
            scope: Scope::First,
            validator,
        }
    }

    /// Collects this strategy's raw candidates from the document
    pub fn candidates(&self, doc: &PageDocument) -> Vec<String> {
        match (self.source, self.scope) {
            (Source::Text, Scope::First) => {
                doc.select_first_text(self.selector).into_iter().collect()
            }
            (Source::Text, Scope::All) => doc.select_texts(self.selector),
            (Source::Attr(attr), Scope::First) => {
                doc.select_first_attr(self.selector, attr).into_iter().collect()
            }
            (Source::Attr(attr), Scope::All) => doc.select_attrs(self.selector, attr),
        }
    }

    /// Returns the first candidate accepted by the validator
    pub fn apply(&self, doc: &PageDocument) -> Option<T> {
        self.candidates(doc)
            .iter()
            .find_map(|candidate| (self.validator)(candidate))
    }
}

/// Runs strategies in order and returns the first validated result
pub fn first_valid<T: 'static>(doc: &PageDocument, strategies: &[Strategy<T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy.apply(doc))
}

pub static TITLE: &[Strategy<String>] = &[
    Strategy::first_text(r#"h1[data-testid="bookTitle"]"#, validate::non_empty),
    Strategy::first_text("h1#bookTitle", validate::non_empty),
    Strategy::first_text("h1", validate::non_empty),
];

pub static AUTHOR: &[Strategy<String>] = &[
    Strategy::first_text(r#"[data-testid="name"]"#, validate::non_empty),
    Strategy::first_text(".authorName", validate::non_empty),
    Strategy::first_text("a.authorName span", validate::non_empty),
];

pub static RATING: &[Strategy<f64>] = &[
    Strategy::all_text(r#"[data-testid="reviewHeader"] div"#, validate::rating),
    Strategy::all_text(r#"span[itemprop="ratingValue"]"#, validate::rating),
    Strategy::all_text(".RatingStatistics__rating", validate::rating),
    Strategy::all_text(".average", validate::rating),
    Strategy::all_text(".BookPageMetadataSection__ratingStats span", validate::rating),
    Strategy::all_text(r#"[data-testid="rating-graph"] div"#, validate::rating),
];

pub static RATING_COUNT: &[Strategy<u64>] = &[
    Strategy::first_attr(r#"meta[itemprop="ratingCount"]"#, "content", validate::rating_count),
    Strategy::first_text(r#"[data-testid="reviewHeader"]"#, validate::rating_count_in_text),
];

pub static DESCRIPTION: &[Strategy<String>] = &[
    Strategy::first_text(r#"[data-testid="description"] span[style]"#, validate::long_description),
    Strategy::first_text(r#"[data-testid="description"] span"#, validate::long_description),
    Strategy::first_text("#description span[style]", validate::long_description),
    Strategy::first_text("#description span", validate::long_description),
    Strategy::first_text(".readable span", validate::long_description),
    Strategy::first_text(r#"[data-testid="contentReviewedByUsers"] span"#, validate::long_description),
    Strategy::first_text(".DetailsLayoutRightParagraph span", validate::long_description),
];

/// Containers holding the full description, in preference order
pub static DESCRIPTION_REGIONS: &[&str] = &[r#"[data-testid="description"]"#, "#description"];

/// Genre tag selector families, in preference order
pub static GENRE_FAMILIES: &[&str] = &[r#"[data-testid="genresList"] a"#, "a.bookPageGenreLink"];

/// Maximum number of genre tags kept per record
pub const MAX_GENRES: usize = 5;
