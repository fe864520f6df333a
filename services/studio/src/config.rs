//! services/studio/src/config.rs
//!
//! Defines the studio's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Scheme, host and port of the generation service, without a trailing slash.
    pub api_origin: String,
    pub log_level: Level,
    pub request_timeout: Duration,
    pub health_check_interval: Duration,
    pub autosave_dir: PathBuf,
    pub autosave_delay: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_origin = lookup("API_ORIGIN")
            .unwrap_or_else(|| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();
        if !(api_origin.starts_with("http://") || api_origin.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "API_ORIGIN".to_string(),
                format!("'{}' must start with http:// or https://", api_origin),
            ));
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let request_timeout =
            Duration::from_secs(parse_number(&lookup, "REQUEST_TIMEOUT_SECS", 120)?);
        let health_check_interval =
            Duration::from_secs(parse_number(&lookup, "HEALTH_CHECK_INTERVAL_SECS", 30)?);
        let autosave_delay = Duration::from_millis(parse_number(&lookup, "AUTOSAVE_DELAY_MS", 30_000)?);

        let autosave_dir = lookup("AUTOSAVE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.lesson-autosave"));

        Ok(Self {
            api_origin,
            log_level,
            request_timeout,
            health_check_interval,
            autosave_dir,
            autosave_delay,
        })
    }

    /// Base URL of the JSON API.
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.api_origin)
    }

    /// Absolute URL of an origin-relative download path returned by an export.
    pub fn download_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.api_origin, path)
        } else {
            format!("{}/{}", self.api_origin, path)
        }
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a positive integer", raw),
            )),
            Ok(value) => Ok(value),
        },
    }
}
