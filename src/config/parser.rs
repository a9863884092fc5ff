use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use catalog_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Quota per category: {}", config.harvest.quota);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stored with every harvest run so a resumed run can be
/// checked against the configuration that started it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[harvest]
quota = 50
batch-size = 20
worker-count = 2
max-batches = 3

[discovery]
max-pages = 10
sort-modes = ["rating"]
search-terms = ["award"]
search-url = "https://example.com/search"

[politeness]
item-delay = { min-ms = 0, max-ms = 10 }

[fetcher]
user-agent = "TestHarvester/1.0"

[output]
directory = "./out"
database-path = "./harvest.db"

[[category]]
url = "https://example.com/shelf/show/fantasy"

[[category]]
url = "https://example.com/shelf/show/mystery"
name = "whodunit"
quota = 25
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.harvest.quota, 50);
        assert_eq!(config.harvest.batch_size, 20);
        assert_eq!(config.harvest.worker_count, 2);
        assert_eq!(config.harvest.max_batches, Some(3));
        assert_eq!(config.discovery.max_pages, 10);
        assert_eq!(config.discovery.sort_modes, vec!["rating".to_string()]);
        // Unset discovery fields keep their defaults
        assert_eq!(config.discovery.sort_pages, 20);
        assert_eq!(config.politeness.item_delay.max_ms, 10);
        assert_eq!(config.politeness.page_delay.min_ms, 1000);
        assert_eq!(config.fetcher.user_agent, "TestHarvester/1.0");
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[1].name.as_deref(), Some("whodunit"));
        assert_eq!(config.categories[1].quota, Some(25));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(
            r#"
[output]
directory = "./out"
database-path = "./harvest.db"
"#,
        )
        .unwrap();

        assert_eq!(config.harvest.quota, 600);
        assert_eq!(config.harvest.batch_size, 1000);
        assert_eq!(config.harvest.worker_count, 4);
        assert!(config.categories.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[harvest]
worker-count = 0

[output]
directory = "./out"
database-path = "./harvest.db"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_load_with_hash_matches_file_hash() {
        let file = create_temp_config(
            r#"
[output]
directory = "./out"
database-path = "./harvest.db"
"#,
        );

        let (_, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }
}
