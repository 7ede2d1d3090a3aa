//! Configuration for the sync core.
//!
//! Values come from an optional TOML file, then environment variables win:
//!
//! | key | env | default |
//! |---|---|---|
//! | `api_base_url` | `DAYBOOK_API_URL` | `http://localhost:3000/api/proxy` |
//! | `request_timeout_ms` | `DAYBOOK_TIMEOUT_MS` | `10000` |
//! | `log_filter` | `DAYBOOK_LOG` | `info` |
//!
//! ```toml
//! api_base_url = "http://localhost:3000/api/proxy"
//! request_timeout_ms = 5000
//! log_filter = "info,daybook_core=debug"
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const ENV_API_URL: &str = "DAYBOOK_API_URL";
pub const ENV_TIMEOUT_MS: &str = "DAYBOOK_TIMEOUT_MS";
pub const ENV_LOG: &str = "DAYBOOK_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Same-origin forwarding endpoint in front of the task service.
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api/proxy".to_string(),
            request_timeout_ms: 10_000,
            log_filter: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// File (if any) plus process environment, validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(|key| env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `lookup` (normally `std::env::var`).
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.request_timeout_ms =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: ENV_TIMEOUT_MS.to_string(),
                        message: e.to_string(),
                    })?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "api_base_url".to_string(),
                message: format!("`{url}` is not an http(s) URL"),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn toml_fills_missing_keys_with_defaults() {
        let config = SyncConfig::from_toml_str("request_timeout_ms = 2500").unwrap();
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.api_base_url, SyncConfig::default().api_base_url);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            SyncConfig::from_toml_str("retries = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn environment_wins_over_file() {
        let file = SyncConfig::from_toml_str(
            "api_base_url = \"http://file.test/api\"\nlog_filter = \"warn\"",
        )
        .unwrap();
        let config = file
            .with_env_overrides(env(&[
                (ENV_API_URL, "https://env.test/api/proxy"),
                (ENV_TIMEOUT_MS, " 750 "),
            ]))
            .unwrap();

        assert_eq!(config.api_base_url, "https://env.test/api/proxy");
        assert_eq!(config.request_timeout_ms, 750);
        assert_eq!(config.log_filter, "warn");
    }

    #[rstest]
    #[case(ENV_TIMEOUT_MS, "soon")]
    #[case(ENV_TIMEOUT_MS, "0")]
    #[case(ENV_API_URL, "localhost:3000")]
    fn bad_environment_values_are_reported(#[case] key: &str, #[case] value: &str) {
        let err = SyncConfig::default()
            .with_env_overrides(env(&[(key, value)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SyncConfig::from_file(Path::new("/nonexistent/daybook.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
