use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryEntry>,
}

/// Harvest sizing parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// Target number of distinct item URLs per category
    pub quota: usize,

    /// Number of URLs extracted and checkpointed as one unit
    pub batch_size: usize,

    /// Number of concurrent extraction workers per batch
    pub worker_count: usize,

    /// Stop after this many batches (unset means process everything)
    pub max_batches: Option<usize>,

    /// Path fragment every item URL must contain
    pub item_marker: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            quota: 600,
            batch_size: 1000,
            worker_count: 4,
            max_batches: None,
            item_marker: crate::url::DEFAULT_ITEM_MARKER.to_string(),
        }
    }
}

/// Frontier discovery strategy parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Page budget for plain listing pagination
    pub max_pages: u32,

    /// Page budget per sort mode
    pub sort_pages: u32,

    /// Page budget per search term
    pub search_pages: u32,

    /// Sort modes tried in order
    pub sort_modes: Vec<String>,

    /// Search terms tried in order, each combined with the category name
    pub search_terms: Vec<String>,

    /// Base URL of the catalog search endpoint
    pub search_url: String,

    /// CSS selectors whose `href` attributes are collected on listing pages
    pub link_selectors: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            sort_pages: 20,
            search_pages: 5,
            sort_modes: ["rating", "num_ratings", "date_added", "date_pub", "title"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            search_terms: [
                "award",
                "bestseller",
                "popular",
                "classic",
                "novel",
                "fiction",
                "mystery",
                "thriller",
                "romance",
                "adventure",
                "series",
                "book",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            search_url: "https://www.goodreads.com/search".to_string(),
            link_selectors: [
                r#"a[href*="/book/show/"]"#,
                r#"a[href*="/book/"]"#,
                ".bookTitle",
                ".bookCover a",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Randomized delay bounds in milliseconds
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A range that never sleeps
    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    /// Draws a uniformly distributed delay from the range
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    /// Sleeps for a sampled delay, skipping the timer entirely for zero
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Politeness backoff between requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PolitenessConfig {
    /// Pause between two items of one worker
    pub item_delay: DelayRange,

    /// Pause between two discovery page visits
    pub page_delay: DelayRange,

    /// Pause between two categories
    pub category_delay: DelayRange,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            item_delay: DelayRange::new(2000, 4000),
            page_delay: DelayRange::new(1000, 3000),
            category_delay: DelayRange::new(5000, 10000),
        }
    }
}

/// Fetch session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// User agent sent with every request
    pub user_agent: String,

    /// Hard ceiling for loading one page (seconds)
    pub page_load_timeout_secs: u64,

    /// Bounded wait for a loaded page to become ready (seconds)
    pub ready_timeout_secs: u64,

    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            page_load_timeout_secs: 20,
            ready_timeout_secs: 15,
            connect_timeout_secs: 10,
        }
    }
}

impl FetcherConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory receiving URL lists, batch snapshots and final exports
    pub directory: String,

    /// Path to the SQLite run ledger
    pub database_path: String,
}

/// A catalog category to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    /// Listing URL of the category (page 1)
    pub url: String,

    /// Display name; defaults to the last path segment of `url`
    #[serde(default)]
    pub name: Option<String>,

    /// Per-category quota overriding `harvest.quota`
    #[serde(default)]
    pub quota: Option<usize>,
}
