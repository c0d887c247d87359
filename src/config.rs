//! Configuration management for Tabwarden

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Lifecycle manager configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Maximum concurrent sessions
    pub max_sessions: usize,

    /// Maximum session creations per 60-second window
    pub max_sessions_per_minute: usize,

    /// Base action timeout in milliseconds
    pub action_timeout_ms: u64,

    /// Idle-eviction threshold in seconds
    pub idle_timeout_secs: u64,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_sessions: 10,
            max_sessions_per_minute: 10,
            action_timeout_ms: 5000,
            idle_timeout_secs: 3600,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(max_sessions) = env::var("TABWARDEN_MAX_SESSIONS") {
            config.max_sessions = max_sessions
                .parse()
                .map_err(|_| Error::configuration("Invalid TABWARDEN_MAX_SESSIONS"))?;
        }

        if let Ok(per_minute) = env::var("TABWARDEN_MAX_SESSIONS_PER_MINUTE") {
            config.max_sessions_per_minute = per_minute
                .parse()
                .map_err(|_| Error::configuration("Invalid TABWARDEN_MAX_SESSIONS_PER_MINUTE"))?;
        }

        if let Ok(timeout) = env::var("TABWARDEN_ACTION_TIMEOUT_MS") {
            config.action_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid TABWARDEN_ACTION_TIMEOUT_MS"))?;
        }

        if let Ok(idle) = env::var("TABWARDEN_IDLE_TIMEOUT_SECS") {
            config.idle_timeout_secs = idle
                .parse()
                .map_err(|_| Error::configuration("Invalid TABWARDEN_IDLE_TIMEOUT_SECS"))?;
        }

        if let Ok(log_level) = env::var("TABWARDEN_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Auto-dismiss duration for unhandled dialogs.
    ///
    /// Twice the base action timeout: long enough for a caller to react,
    /// short enough to bound how long an abandoned dialog can block a page.
    pub fn dialog_auto_dismiss(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms * 2)
    }

    /// Idle-eviction threshold as a [`Duration`]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_sessions, 10);
        assert_eq!(config.max_sessions_per_minute, 10);
        assert_eq!(config.dialog_auto_dismiss(), Duration::from_millis(10000));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            max_sessions = 3
            max_sessions_per_minute = 5
            action_timeout_ms = 1000
            idle_timeout_secs = 600
            log_level = "debug"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.max_sessions, 3);
        assert_eq!(config.dialog_auto_dismiss(), Duration::from_millis(2000));
        assert_eq!(config.idle_timeout(), Duration::from_secs(600));
    }
}
