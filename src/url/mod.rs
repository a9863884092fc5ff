//! URL handling module for Catalog-Harvest
//!
//! This module provides item URL canonicalization (the deduplication key used by
//! discovery) and construction of listing, sorted-listing and search page URLs.

mod canonical;
mod listing;

// Re-export main functions
pub use canonical::{canonicalize, is_item_link, DEFAULT_ITEM_MARKER};
pub use listing::{category_name, listing_page_url, search_page_url, sorted_page_url};
