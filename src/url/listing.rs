//! Listing, sorted-listing and search page URL construction

use url::Url;

/// Derives a category name from its listing URL
///
/// The name is the last non-empty path segment, e.g. `fantasy` for
/// `https://www.goodreads.com/shelf/show/fantasy`.
pub fn category_name(listing: &Url) -> Option<String> {
    listing
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}

/// Returns the URL of page `page` of a category listing
///
/// Page 1 is the bare listing URL.
pub fn listing_page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    if page > 1 {
        url.query_pairs_mut().append_pair("page", &page.to_string());
    }
    url
}

/// Returns the URL of page `page` of a listing sorted by `sort_mode`
pub fn sorted_page_url(base: &Url, sort_mode: &str, page: u32) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("sort", sort_mode)
        .append_pair("page", &page.to_string());
    url
}

/// Returns the URL of page `page` of a keyword search scoped to a category
pub fn search_page_url(search: &Url, term: &str, category: &str, page: u32) -> Url {
    let mut url = search.clone();
    url.query_pairs_mut()
        .append_pair("q", &format!("{} {}", term, category))
        .append_pair("page", &page.to_string());
    url
}
