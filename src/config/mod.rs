//! Configuration loading and validation
//!
//! Configuration comes from an optional TOML file; every value has a default
//! so the harvester runs with no file at all. CLI flags override file values
//! at the call site (see `main.rs`).

use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure for certsweep
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub harvester: HarvesterConfig,
    pub output: OutputConfig,
    /// Named ID patterns overriding the built-in catalog (empty = built-ins)
    #[serde(rename = "pattern")]
    pub patterns: Vec<PatternEntry>,
}

/// Upstream endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL of the verification endpoint; record URLs are
    /// `<base-url>/<id>/`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Total request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.edu.az/az/verified".to_string(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

/// Harvester behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    /// Maximum number of concurrent resolutions in flight
    pub concurrency: usize,

    /// Maximum retry attempts per candidate ID beyond the first
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Flush the store after this many completed resolutions
    #[serde(rename = "flush-every")]
    pub flush_every: usize,

    /// Base backoff delay in milliseconds (doubled per attempt)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Backoff cap for server errors and timeouts, in milliseconds
    #[serde(rename = "backoff-cap-ms")]
    pub backoff_cap_ms: u64,

    /// Backoff cap for rate-limit responses, in milliseconds
    #[serde(rename = "rate-limit-cap-ms")]
    pub rate_limit_cap_ms: u64,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            max_retries: 5,
            flush_every: 50,
            backoff_base_ms: 1000,
            backoff_cap_ms: 16_000,
            rate_limit_cap_ms: 32_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the CSV record table; checkpoint and backup files live
    /// alongside it
    #[serde(rename = "table-path")]
    pub table_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            table_path: "data/certificates.csv".to_string(),
        }
    }
}

/// A named candidate ID pattern from the config file
#[derive(Debug, Clone, Deserialize)]
pub struct PatternEntry {
    pub name: String,
    pub start: u64,
    pub end: u64,
}

/// Loads and parses a configuration file from the given path
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, is not valid TOML,
/// or fails validation.
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Validates a configuration, whether loaded from file or built in code
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.endpoint.base_url.is_empty() {
        return Err(ConfigError::Validation(
            "endpoint.base-url must not be empty".to_string(),
        ));
    }

    if !config.endpoint.base_url.starts_with("http://")
        && !config.endpoint.base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(format!(
            "endpoint.base-url must be an http(s) URL, got '{}'",
            config.endpoint.base_url
        )));
    }

    if config.endpoint.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "endpoint.timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.harvester.concurrency == 0 {
        return Err(ConfigError::Validation(
            "harvester.concurrency must be greater than 0".to_string(),
        ));
    }

    if config.harvester.flush_every == 0 {
        return Err(ConfigError::Validation(
            "harvester.flush-every must be greater than 0".to_string(),
        ));
    }

    if config.harvester.backoff_base_ms == 0 {
        return Err(ConfigError::Validation(
            "harvester.backoff-base-ms must be greater than 0".to_string(),
        ));
    }

    if config.output.table_path.is_empty() {
        return Err(ConfigError::Validation(
            "output.table-path must not be empty".to_string(),
        ));
    }

    for pattern in &config.patterns {
        if pattern.start > pattern.end {
            return Err(ConfigError::Validation(format!(
                "pattern '{}' has start {} greater than end {}",
                pattern.name, pattern.start, pattern.end
            )));
        }
    }

    Ok(())
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
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.harvester.concurrency, 50);
        assert_eq!(config.harvester.max_retries, 5);
        assert_eq!(config.harvester.flush_every, 50);
        assert_eq!(config.endpoint.base_url, "https://data.edu.az/az/verified");
        assert!(config.patterns.is_empty());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[endpoint]
base-url = "https://example.com/verified"
timeout-secs = 15

[harvester]
concurrency = 20
max-retries = 3
flush-every = 25

[output]
table-path = "./out.csv"

[[pattern]]
name = "2024 legacy"
start = 2024101
end = 2024999
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.endpoint.base_url, "https://example.com/verified");
        assert_eq!(config.endpoint.timeout_secs, 15);
        // Unspecified values fall back to defaults
        assert_eq!(config.endpoint.connect_timeout_secs, 5);
        assert_eq!(config.harvester.concurrency, 20);
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.patterns[0].start, 2024101);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/certsweep.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config_content = r#"
[harvester]
concurrency = 0
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_inverted_pattern_rejected() {
        let config_content = r#"
[[pattern]]
name = "backwards"
start = 100
end = 1
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let config_content = r#"
[endpoint]
base-url = "ftp://example.com"
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }
}
