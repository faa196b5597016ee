//! Runtime configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, then `RENTALS_*` environment variables.
//!
//! ```toml
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 50
//! max_backoff_ms = 1000
//!
//! [log]
//! filter = "info,movie_rentals=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Bounded retry with exponential backoff for stock adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    50
}

fn default_max_backoff() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// No backoff between attempts. Handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::InvalidValue(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                debug!(?path, "Loading config file");
                let contents = std::fs::read_to_string(path)?;
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.retry.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var("RENTALS_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = value.parse().map_err(|_| {
                ConfigError::InvalidValue("RENTALS_RETRY_MAX_ATTEMPTS".to_string())
            })?;
        }
        if let Ok(filter) = std::env::var("RENTALS_LOG") {
            self.log.filter = filter;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff_ms, 50);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("[retry]\nmax_attempts = 5\n").unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.max_backoff_ms, 1000);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        assert!(matches!(
            Config::from_toml("[retry]\nmax_attempts = \"many\"\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        assert!(matches!(
            RetryPolicy::immediate(0).validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 150,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(50));
        assert_eq!(policy.backoff(2), Duration::from_millis(100));
        assert_eq!(policy.backoff(3), Duration::from_millis(150));
        assert_eq!(policy.backoff(10), Duration::from_millis(150));
    }
}
