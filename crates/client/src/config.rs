//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `SHOPFRONT_STORAGE_DIR` - Directory for persisted session and cart state (default: .shopfront)
//! - `SHOPFRONT_REFRESH_TIMEOUT_SECS` - Timeout for the token refresh call (default: 10)
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - Timeout for every other API call (default: 30)
//! - `SHOPFRONT_SESSION_EXPIRED_PATH` - Re-authentication entry point after a forced logout
//!   (default: /login?expired=true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = ".shopfront";
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_EXPIRED_PATH: &str = "/login?expired=true";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Shopfront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API (endpoints such as `/auth/login` are appended)
    pub api_url: Url,
    /// Directory used by the file-backed store
    pub storage_dir: PathBuf,
    /// Upper bound on a single refresh call; queued requests wait at most this long
    pub refresh_timeout: Duration,
    /// Per-request timeout for dispatched calls
    pub request_timeout: Duration,
    /// Where the UI should send the user after an unrecoverable session error
    pub session_expired_path: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the API URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_expired_path: DEFAULT_SESSION_EXPIRED_PATH.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw_url = get_required_env("SHOPFRONT_API_URL")?;
        let api_url = parse_api_url("SHOPFRONT_API_URL", &raw_url)?;

        let refresh_timeout = parse_secs(
            "SHOPFRONT_REFRESH_TIMEOUT_SECS",
            &get_env_or_default(
                "SHOPFRONT_REFRESH_TIMEOUT_SECS",
                &DEFAULT_REFRESH_TIMEOUT_SECS.to_string(),
            ),
        )?;
        let request_timeout = parse_secs(
            "SHOPFRONT_REQUEST_TIMEOUT_SECS",
            &get_env_or_default(
                "SHOPFRONT_REQUEST_TIMEOUT_SECS",
                &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
            ),
        )?;

        Ok(Self {
            api_url,
            storage_dir: PathBuf::from(get_env_or_default(
                "SHOPFRONT_STORAGE_DIR",
                DEFAULT_STORAGE_DIR,
            )),
            refresh_timeout,
            request_timeout,
            session_expired_path: get_env_or_default(
                "SHOPFRONT_SESSION_EXPIRED_PATH",
                DEFAULT_SESSION_EXPIRED_PATH,
            ),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Resolve an endpoint path (`/auth/login`, `/api/orders?page=2`) against the API URL.
    ///
    /// The endpoint is appended to the base path rather than replacing it, so
    /// a base of `https://shop.example/v1` yields `https://shop.example/v1/auth/login`.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the joined URL is invalid.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        let base = self.api_url.as_str().trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse the API base URL, requiring an http(s) scheme.
fn parse_api_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Parse a positive number of seconds.
fn parse_secs(var_name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new(Url::parse("http://localhost:4000").unwrap());
        assert_eq!(config.refresh_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.session_expired_path, "/login?expired=true");
        assert_eq!(config.storage_dir, PathBuf::from(".shopfront"));
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let config = ClientConfig::new(Url::parse("https://shop.example/v1/").unwrap());
        assert_eq!(
            config.endpoint_url("/auth/login").unwrap().as_str(),
            "https://shop.example/v1/auth/login"
        );
        assert_eq!(
            config.endpoint_url("api/orders?page=2").unwrap().as_str(),
            "https://shop.example/v1/api/orders?page=2"
        );
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("X", " 15 ").unwrap(), Duration::from_secs(15));
        assert!(matches!(
            parse_secs("X", "0"),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            parse_secs("X", "soon"),
            Err(ConfigError::InvalidEnvVar(..))
        ));
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        assert!(parse_api_url("X", "https://shop.example").is_ok());
        assert!(matches!(
            parse_api_url("X", "ftp://shop.example"),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(parse_api_url("X", "not a url").is_err());
    }
}
