//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream endpoints and request identity
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry, backoff and pacing discipline
    #[serde(default)]
    pub retry: RetryConfig,

    /// Defaults for list operations
    #[serde(default)]
    pub scan: ScanConfig,

    /// Log filter used by the CLI
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| AppError::validation(format!("api.base_url is invalid: {e}")))?;
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.app_id.trim().is_empty() {
            return Err(AppError::validation("api.app_id is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.min_pacing_ms > self.retry.max_pacing_ms {
            return Err(AppError::validation(
                "retry.min_pacing_ms must not exceed retry.max_pacing_ms",
            ));
        }
        if self.scan.page_size == 0 {
            return Err(AppError::validation("scan.page_size must be > 0"));
        }
        if self.scan.max_concurrent == 0 {
            return Err(AppError::validation("scan.max_concurrent must be > 0"));
        }
        Ok(())
    }
}

/// Upstream endpoints and the identity presented on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Site root, e.g. `https://www.instagram.com`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Path prefix of the private JSON API
    #[serde(default = "defaults::api_prefix")]
    pub api_prefix: String,

    /// Value of the `X-IG-App-ID` header
    #[serde(default = "defaults::app_id")]
    pub app_id: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Value of the `X-ASBD-ID` anti-bot header
    #[serde(default = "defaults::asbd_id")]
    pub asbd_id: String,

    /// Value of the `X-IG-WWW-Claim` header
    #[serde(default = "defaults::www_claim")]
    pub www_claim: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Persisted GraphQL query used for the timeline fallback
    #[serde(default = "defaults::timeline_query_hash")]
    pub timeline_query_hash: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            api_prefix: defaults::api_prefix(),
            app_id: defaults::app_id(),
            user_agent: defaults::user_agent(),
            asbd_id: defaults::asbd_id(),
            www_claim: defaults::www_claim(),
            timeout_secs: defaults::timeout(),
            timeline_query_hash: defaults::timeline_query_hash(),
        }
    }
}

/// Retry and pacing settings for the backoff governor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per source before giving up
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit; attempt `n` waits `n * base_delay_ms`
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Lower bound of the randomized delay before every attempt
    #[serde(default = "defaults::min_pacing")]
    pub min_pacing_ms: u64,

    /// Upper bound of the randomized delay before every attempt
    #[serde(default = "defaults::max_pacing")]
    pub max_pacing_ms: u64,

    /// Retry a source whose payload failed to normalize
    #[serde(default)]
    pub retry_malformed: bool,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Settings with every delay zeroed, for tests and offline replays.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            min_pacing_ms: 0,
            max_pacing_ms: 0,
            retry_malformed: false,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            min_pacing_ms: defaults::min_pacing(),
            max_pacing_ms: defaults::max_pacing(),
            retry_malformed: false,
        }
    }
}

/// Defaults applied to list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Items requested per page where the endpoint accepts a count
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Independent operations run at once by `scan_tags`
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::page_size(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter (`error`, `warn`, `info`, `debug`)
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Api defaults
    pub fn base_url() -> String {
        "https://www.instagram.com".into()
    }
    pub fn api_prefix() -> String {
        "api/v1".into()
    }
    pub fn app_id() -> String {
        "936619743392459".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36"
            .into()
    }
    pub fn asbd_id() -> String {
        "129477".into()
    }
    pub fn www_claim() -> String {
        "0".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn timeline_query_hash() -> String {
        "e769aa130647d2354c40ea6a439bfc08".into()
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        1000
    }
    pub fn min_pacing() -> u64 {
        2000
    }
    pub fn max_pacing() -> u64 {
        4000
    }

    // Scan defaults
    pub fn page_size() -> usize {
        50
    }
    pub fn max_concurrent() -> usize {
        3
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.api.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_pacing() {
        let mut config = Config::default();
        config.retry.min_pacing_ms = 5000;
        config.retry.max_pacing_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[retry]\nmax_attempts = 5\n\n[api]\nbase_url = \"http://localhost:8080\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.api.app_id, "936619743392459");
        assert_eq!(config.scan.page_size, 50);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/instascan.toml");
        assert_eq!(config.api.api_prefix, "api/v1");
    }
}
