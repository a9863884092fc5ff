//! Field validators
//!
//! Each validator turns one raw candidate string into a field value, or
//! rejects it so the next strategy in the field's list is tried.

use regex::Regex;
use std::sync::LazyLock;

/// Descriptions at or below this many characters are treated as truncated
pub const MIN_DESCRIPTION_CHARS: usize = 100;

/// Accepted descriptions shorter than this may still be a truncated blurb
pub const FULL_DESCRIPTION_CHARS: usize = 200;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("hardcoded regex pattern is valid"));

static RATING_COUNT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\d,]+)\s*rating").expect("hardcoded regex pattern is valid")
});

/// Accepts any non-blank text
pub fn non_empty(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Accepts the first number in the text if it lies in (0, 5]
///
/// ```
/// use catalog_harvest::extract::validate::rating;
///
/// assert_eq!(rating("3.5"), Some(3.5));
/// assert_eq!(rating("0"), None);
/// assert_eq!(rating("5.1"), None);
/// ```
pub fn rating(candidate: &str) -> Option<f64> {
    let number = FIRST_NUMBER.captures(candidate)?.get(1)?.as_str();
    let value: f64 = number.parse().ok()?;
    (value > 0.0 && value <= 5.0).then_some(value)
}

/// Accepts a non-negative integer written with optional thousands separators
pub fn rating_count(candidate: &str) -> Option<u64> {
    let digits: String = candidate
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Accepts free text of the form "12,345 ratings"
pub fn rating_count_in_text(candidate: &str) -> Option<u64> {
    let count = RATING_COUNT_TEXT.captures(candidate)?.get(1)?.as_str();
    rating_count(count)
}

/// Accepts a description only if it is longer than [`MIN_DESCRIPTION_CHARS`]
pub fn long_description(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    (trimmed.chars().count() > MIN_DESCRIPTION_CHARS).then(|| trimmed.to_string())
}
