use crate::{UrlError, UrlResult};
use url::Url;

/// Path fragment that identifies an item page in the catalog
pub const DEFAULT_ITEM_MARKER: &str = "/book/show/";

/// Canonicalizes a raw item URL into its deduplication key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https schemes with a host
/// 3. Remove the query string (everything after `?`)
/// 4. Remove the fragment (everything after `#`)
/// 5. Reject the URL if its path does not contain `item_marker`
///
/// The result holds scheme, host and path only. Applying the function to
/// its own output returns the same string.
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::canonicalize;
///
/// let url = canonicalize(
///     "https://www.goodreads.com/book/show/42.Dune?from_search=true#reviews",
///     "/book/show/",
/// )
/// .unwrap();
/// assert_eq!(url, "https://www.goodreads.com/book/show/42.Dune");
/// ```
pub fn canonicalize(raw: &str, item_marker: &str) -> UrlResult<String> {
    let raw = raw.trim();
    let mut url = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(raw.to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);

    // The marker has to live in the path, a marker inside the query does not count
    if !url.path().contains(item_marker) {
        return Err(UrlError::Malformed(raw.to_string()));
    }

    Ok(url.to_string())
}

/// Returns true if the raw link is a candidate item link
///
/// Discovery uses it to skip navigation links before canonicalizing.
pub fn is_item_link(raw: &str, item_marker: &str) -> bool {
    raw.contains(item_marker)
}
