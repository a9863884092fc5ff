use crate::config::types::{
    CategoryEntry, Config, DelayRange, DiscoveryConfig, FetcherConfig, HarvestConfig,
    OutputConfig, PolitenessConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Upper bound on concurrent fetch sessions per batch
pub const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_discovery_config(&config.discovery)?;
    validate_politeness_config(&config.politeness)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Validates harvest sizing
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.quota < 1 {
        return Err(ConfigError::Validation(
            "quota must be >= 1, got 0".to_string(),
        ));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch-size must be >= 1, got 0".to_string(),
        ));
    }

    if config.worker_count < 1 || config.worker_count > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "worker-count must be between 1 and {}, got {}",
            MAX_WORKERS, config.worker_count
        )));
    }

    if config.max_batches == Some(0) {
        return Err(ConfigError::Validation(
            "max-batches must be >= 1 when set".to_string(),
        ));
    }

    if config.item_marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "item-marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates discovery strategy parameters
fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1, got 0".to_string(),
        ));
    }

    let search_url = Url::parse(&config.search_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search-url: {}", e)))?;
    validate_http_scheme(&search_url, "search-url")?;

    if config.link_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "link-selectors must contain at least one selector".to_string(),
        ));
    }

    for selector in &config.link_selectors {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
    }

    Ok(())
}

/// Validates politeness delay ranges
fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    validate_delay_range(&config.item_delay, "item-delay")?;
    validate_delay_range(&config.page_delay, "page-delay")?;
    validate_delay_range(&config.category_delay, "category-delay")?;
    Ok(())
}

fn validate_delay_range(range: &DelayRange, name: &str) -> Result<(), ConfigError> {
    if range.min_ms > range.max_ms {
        return Err(ConfigError::Validation(format!(
            "{} min-ms ({}) must not exceed max-ms ({})",
            name, range.min_ms, range.max_ms
        )));
    }
    Ok(())
}

/// Validates fetch session configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.page_load_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "page-load-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.ready_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "ready-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates category entries
///
/// Every category needs an http(s) listing URL and a unique, non-empty name
/// (explicit or derived from the URL path).
fn validate_categories(categories: &[CategoryEntry]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for entry in categories {
        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid category URL '{}': {}", entry.url, e))
        })?;
        validate_http_scheme(&url, "category url")?;

        let name = entry
            .name
            .clone()
            .or_else(|| crate::url::category_name(&url))
            .unwrap_or_default();

        if name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Category '{}' has no name and none can be derived from its URL",
                entry.url
            )));
        }

        if !names.insert(name.clone()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate category name '{}'",
                name
            )));
        }

        if entry.quota == Some(0) {
            return Err(ConfigError::Validation(format!(
                "Category '{}' quota must be >= 1",
                name
            )));
        }
    }

    Ok(())
}

fn validate_http_scheme(url: &Url, field: &str) -> Result<(), ConfigError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config {
            harvest: HarvestConfig::default(),
            discovery: DiscoveryConfig::default(),
            politeness: PolitenessConfig::default(),
            fetcher: FetcherConfig::default(),
            output: OutputConfig {
                directory: "./out".to_string(),
                database_path: "./harvest.db".to_string(),
            },
            categories: vec![CategoryEntry {
                url: "https://example.com/shelf/show/fantasy".to_string(),
                name: None,
                quota: None,
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&create_valid_config()).is_ok());
    }

    #[test]
    fn test_zero_quota() {
        let mut config = create_valid_config();
        config.harvest.quota = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_worker_count_bounds() {
        let mut config = create_valid_config();
        config.harvest.worker_count = 0;
        assert!(validate(&config).is_err());

        config.harvest.worker_count = MAX_WORKERS + 1;
        assert!(validate(&config).is_err());

        config.harvest.worker_count = MAX_WORKERS;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_inverted_delay_range() {
        let mut config = create_valid_config();
        config.politeness.item_delay = DelayRange::new(500, 100);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_link_selector() {
        let mut config = create_valid_config();
        config.discovery.link_selectors = vec!["a[[[".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_category_with_bad_scheme() {
        let mut config = create_valid_config();
        config.categories[0].url = "ftp://example.com/shelf/show/fantasy".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_category_names() {
        let mut config = create_valid_config();
        config.categories.push(CategoryEntry {
            url: "https://example.com/genres/fantasy".to_string(),
            name: None,
            quota: None,
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_explicit_name_resolves_duplicate() {
        let mut config = create_valid_config();
        config.categories.push(CategoryEntry {
            url: "https://example.com/genres/fantasy".to_string(),
            name: Some("fantasy-genre".to_string()),
            quota: Some(50),
        });
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_no_categories_is_valid() {
        let mut config = create_valid_config();
        config.categories.clear();
        assert!(validate(&config).is_ok());
    }
}
