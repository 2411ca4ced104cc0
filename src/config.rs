//! Minimal runtime configuration helpers.
//! Defaults match the public Nature Remo cloud API.

use crate::client::{BASE_URL, DEFAULT_TIMEOUT};
use crate::services::poller::DEFAULT_POLL_INTERVAL;
use crate::services::setup::{DEFAULT_COOL_TEMP, DEFAULT_HEAT_TEMP};
use std::time::Duration;
use std::{fs, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing access token: set NATURE_REMO_ACCESS_TOKEN or provide token.txt in working directory")]
    MissingToken,
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Personal access token issued at home.nature.global.
    pub access_token: String,
    pub api_base_url: String,
    /// Polling cadence.
    pub poll_interval: Duration,
    /// Upper bound for every single API request.
    pub request_timeout: Duration,
    /// Default cooling target, passed through to consumers untouched.
    pub cool_temperature: i32,
    /// Default heating target, passed through to consumers untouched.
    pub heat_temperature: i32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Prefer env var; fallback to token.txt in working directory
        let access_token = match lookup("NATURE_REMO_ACCESS_TOKEN") {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => match fs::read_to_string(Path::new("token.txt")) {
                Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => return Err(ConfigError::MissingToken),
            },
        };

        let api_base_url = lookup("NATURE_REMO_API_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| BASE_URL.to_string());

        let poll_secs = parse_var(&lookup, "POLL_INTERVAL_SECS", "a positive number of seconds")?
            .unwrap_or(DEFAULT_POLL_INTERVAL.as_secs());
        let timeout_secs = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", "a positive number of seconds")?
            .unwrap_or(DEFAULT_TIMEOUT.as_secs());
        for (name, value) in [("POLL_INTERVAL_SECS", poll_secs), ("REQUEST_TIMEOUT_SECS", timeout_secs)] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    expected: "a positive number of seconds",
                    value: value.to_string(),
                });
            }
        }

        let cool_temperature =
            parse_var(&lookup, "COOL_TEMPERATURE", "an integer temperature")?.unwrap_or(DEFAULT_COOL_TEMP);
        let heat_temperature =
            parse_var(&lookup, "HEAT_TEMPERATURE", "an integer temperature")?.unwrap_or(DEFAULT_HEAT_TEMP);

        Ok(Config {
            access_token,
            api_base_url,
            poll_interval: Duration::from_secs(poll_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            cool_temperature,
            heat_temperature,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, expected, value: s }),
        _ => Ok(None),
    }
}
