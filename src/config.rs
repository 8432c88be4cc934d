//! # Configuration Module
//!
//! This module defines the API endpoint defaults and handles loading of
//! overrides from environment variables. The resulting [`Config`] value is
//! constructed once at startup and injected into the API client, so no code
//! outside this module reads ambient process state.

use std::env;
use std::fmt;

/// Base URL for the MVG departures endpoint.
pub const DEPARTURES_BASE_URL: &str = "https://www.mvg.de/api/bgw-pt/v3/departures";
/// Base URL for the MVG line messages (news) endpoint.
pub const NEWS_BASE_URL: &str = "https://www.mvg.de/api/bgw-pt/v3/messages";
/// Base URL for the MVG location search endpoint.
pub const SEARCH_BASE_URL: &str = "https://www.mvg.de/api/bgw-pt/v3/locations";

/// Environment variable overriding the departures endpoint.
pub const DEPARTURES_URL_VAR: &str = "DEPARTURES_API";
/// Environment variable overriding the news endpoint.
pub const NEWS_URL_VAR: &str = "NEWS_API";
/// Environment variable holding the optional bearer token.
pub const API_KEY_VAR: &str = "API_KEY";

/// Client-side request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Represents errors that can occur when loading configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The environment variable is set but contains an empty or whitespace-only value.
    EmptyVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyVar(var) => write!(
                f,
                "Environment variable '{var}' is set but empty. \
                Unset it to use the default, or provide a non-empty value."
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Resolved API configuration.
///
/// All endpoint URLs default to the public MVG API and may be overridden
/// through the environment. The bearer token is optional; when absent, requests
/// carry no `Authorization` header.
#[derive(Debug, Clone)]
pub struct Config {
    /// Departures endpoint URL.
    pub departures_url: String,
    /// News (line messages) endpoint URL.
    pub news_url: String,
    /// Station search endpoint URL.
    pub search_url: String,
    /// Optional static bearer token.
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            departures_url: DEPARTURES_BASE_URL.to_string(),
            news_url: NEWS_BASE_URL.to_string(),
            search_url: SEARCH_BASE_URL.to_string(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Builds a configuration from the process environment.
    ///
    /// Unset variables fall back to the public MVG endpoints. A variable that
    /// is set but blank is rejected rather than silently shadowing the
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyVar`] if an override variable is set to an
    /// empty or whitespace-only value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// The lookup closure stands in for `std::env::var`, which keeps this
    /// logic testable without mutating process state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = checked(DEPARTURES_URL_VAR, &lookup)? {
            config.departures_url = url;
        }
        if let Some(url) = checked(NEWS_URL_VAR, &lookup)? {
            config.news_url = url;
        }
        config.api_token = checked(API_KEY_VAR, &lookup)?;

        Ok(config)
    }

    /// Redirects every endpoint to the given base URL (used by tests against a
    /// mock server).
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.departures_url = format!("{base}/departures");
        self.news_url = format!("{base}/messages");
        self.search_url = format!("{base}/locations");
        self
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Reads one variable through the lookup, rejecting set-but-blank values.
fn checked<F>(var: &'static str, lookup: &F) -> Result<Option<String>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyVar(var)),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}
