//! Configuration management for catalog-sync
//!
//! This module handles loading, parsing, and validating application
//! configuration from YAML files and environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Remote catalog API configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Sync pipeline configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // Expand environment variables before parsing
        let expanded = expand_env_vars(yaml);
        let config: Config =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from environment variables with prefix CATALOG_SYNC_
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = std::env::var("CATALOG_SYNC_BASE_URL") {
            self.catalog.base_url = url;
        }
        if let Ok(lang) = std::env::var("CATALOG_SYNC_LANGUAGE") {
            self.catalog.language = lang;
        }
        if let Ok(path) = std::env::var("CATALOG_SYNC_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Ok(level) = std::env::var("CATALOG_SYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(pages) = std::env::var("CATALOG_SYNC_PAGE_CONCURRENCY") {
            self.sync.page_concurrency = pages
                .parse()
                .map_err(|_| ConfigError::Parse("invalid page concurrency".to_string()))?;
        }
        self.validate()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.retry.backoff_multiplier <= 1.0 {
            return Err(ConfigError::Invalid(
                "backoff_multiplier must be greater than 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.catalog.retry.jitter_fraction) {
            return Err(ConfigError::Invalid(
                "jitter_fraction must be within [0, 1]".to_string(),
            ));
        }
        if self.sync.page_concurrency == 0 || self.sync.item_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.sync.start_page == 0 {
            return Err(ConfigError::Invalid(
                "pages are numbered from 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote catalog API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Base URL of the remote catalog API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Target language for catalog content
    #[serde(default = "default_language")]
    pub language: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker configuration
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Degraded-mode fallback cache configuration
    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language: default_language(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Retry configuration for remote catalog calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (initial attempt not counted)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Fraction of the delay added as uniform random jitter, in [0, 1]
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,

    /// Per-attempt timeout in milliseconds (0 disables the deadline)
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    /// Per-attempt deadline, if enabled
    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.attempt_timeout_ms > 0).then(|| Duration::from_millis(self.attempt_timeout_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_fraction: default_jitter_fraction(),
            attempt_timeout_ms: default_attempt_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.2
}

fn default_attempt_timeout() -> u64 {
    10_000
}

/// Rate limiting configuration for the HTTP client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Minimum interval between requests to the same host, in milliseconds
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,

    /// Maximum number of concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Wait time when rate limited without a Retry-After header (in seconds)
    #[serde(default = "default_rate_limit_wait")]
    pub rate_limit_wait_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval(),
            max_concurrent: default_max_concurrent(),
            rate_limit_wait_secs: default_rate_limit_wait(),
        }
    }
}

fn default_min_interval() -> u64 {
    200
}

fn default_max_concurrent() -> usize {
    4
}

fn default_rate_limit_wait() -> u64 {
    60
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before allowing a probe call
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,

    /// Consecutive probe successes required to close the circuit again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Open-state cool-down window
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout(),
            success_threshold: default_success_threshold(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout() -> u64 {
    60
}

fn default_success_threshold() -> u32 {
    3
}

/// Degraded-mode fallback cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackConfig {
    /// Seconds a cached value stays servable
    #[serde(default = "default_fallback_ttl")]
    pub ttl_secs: u64,
}

impl FallbackConfig {
    /// Cache entry time-to-live
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_fallback_ttl(),
        }
    }
}

fn default_fallback_ttl() -> u64 {
    300
}

/// Sync pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Number of pages processed concurrently
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: usize,

    /// Number of items fetched concurrently within one page
    #[serde(default = "default_item_concurrency")]
    pub item_concurrency: usize,

    /// First page to synchronize (1-based)
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Last page to synchronize (inclusive); None means through the last page
    #[serde(default)]
    pub end_page: Option<u32>,

    /// Clear previously synchronized catalog data before running
    #[serde(default)]
    pub reset: bool,

    /// Maximum number of error messages included in the final report
    #[serde(default = "default_error_sample_size")]
    pub error_sample_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_concurrency: default_page_concurrency(),
            item_concurrency: default_item_concurrency(),
            start_page: default_start_page(),
            end_page: None,
            reset: false,
            error_sample_size: default_error_sample_size(),
        }
    }
}

fn default_page_concurrency() -> usize {
    4
}

fn default_item_concurrency() -> usize {
    2
}

fn default_start_page() -> u32 {
    1
}

fn default_error_sample_size() -> usize {
    10
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file (":memory:" for in-memory)
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "catalog-sync.db".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Expand `${VAR}` references in a string using the process environment
///
/// Unknown variables are left untouched so parsing can surface them as the
/// invalid values they are.
fn expand_env_vars(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                match std::env::var(name) {
                    Ok(value) => output.push_str(&value),
                    Err(_) => output.push_str(&rest[start..start + 3 + end]),
                }
                rest = &rest[start + 3 + end..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Default configuration values
    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.catalog.language, "en");
        assert_eq!(config.catalog.retry.max_retries, 3);
        assert_eq!(config.catalog.retry.initial_backoff_ms, 500);
        assert_eq!(config.catalog.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.catalog.circuit_breaker.reset_timeout_secs, 60);
        assert_eq!(config.catalog.circuit_breaker.success_threshold, 3);
        assert_eq!(config.catalog.fallback.ttl_secs, 300);
        assert_eq!(config.sync.page_concurrency, 4);
        assert_eq!(config.sync.item_concurrency, 2);
        assert_eq!(config.sync.start_page, 1);
        assert_eq!(config.sync.end_page, None);
        assert!(!config.sync.reset);
        assert_eq!(config.database.path, "catalog-sync.db");
        assert_eq!(config.logging.level, "info");
    }

    // Test 2: Partial YAML fills the rest with defaults
    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
catalog:
  base_url: "https://shop.example.com/api"
  language: "de"
sync:
  page_concurrency: 8
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.catalog.base_url, "https://shop.example.com/api");
        assert_eq!(config.catalog.language, "de");
        assert_eq!(config.sync.page_concurrency, 8);
        // Untouched sections keep defaults
        assert_eq!(config.sync.item_concurrency, 2);
        assert_eq!(config.catalog.retry.max_retries, 3);
    }

    // Test 3: Environment variable expansion in YAML
    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("CATALOG_SYNC_TEST_URL", "https://env.example.com");
        let yaml = r#"
catalog:
  base_url: "${CATALOG_SYNC_TEST_URL}"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.catalog.base_url, "https://env.example.com");
        std::env::remove_var("CATALOG_SYNC_TEST_URL");
    }

    // Test 4: Unknown environment variables are left untouched
    #[test]
    fn test_unknown_env_var_untouched() {
        let expanded = expand_env_vars("url: ${CATALOG_SYNC_DOES_NOT_EXIST}/x");
        assert_eq!(expanded, "url: ${CATALOG_SYNC_DOES_NOT_EXIST}/x");
    }

    // Test 5: Validation rejects a multiplier at or below 1
    #[test]
    fn test_validation_rejects_bad_multiplier() {
        let yaml = r#"
catalog:
  retry:
    backoff_multiplier: 1.0
"#;
        let result = Config::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    // Test 6: Validation rejects jitter fraction outside [0, 1]
    #[test]
    fn test_validation_rejects_bad_jitter() {
        let yaml = r#"
catalog:
  retry:
    jitter_fraction: 1.5
"#;
        let result = Config::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    // Test 7: Validation rejects zero concurrency
    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let yaml = r#"
sync:
  item_concurrency: 0
"#;
        let result = Config::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    // Test 8: Attempt timeout of zero disables the deadline
    #[test]
    fn test_attempt_timeout_disabled() {
        let mut retry = RetryConfig::default();
        retry.attempt_timeout_ms = 0;
        assert_eq!(retry.attempt_timeout(), None);

        retry.attempt_timeout_ms = 2500;
        assert_eq!(retry.attempt_timeout(), Some(Duration::from_millis(2500)));
    }

    // Test 9: Malformed YAML is a parse error
    #[test]
    fn test_malformed_yaml() {
        let result = Config::from_yaml("catalog: [not, a, map");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    // Test 10: Environment overrides
    #[test]
    fn test_apply_env_overrides() {
        std::env::set_var("CATALOG_SYNC_LANGUAGE", "fr");
        let mut config = Config::default();
        config.apply_env().unwrap();
        assert_eq!(config.catalog.language, "fr");
        std::env::remove_var("CATALOG_SYNC_LANGUAGE");
    }
}
