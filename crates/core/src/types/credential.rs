//! Access credential types.
//!
//! The access token is an opaque bearer string. It is wrapped in a
//! [`SecretString`] so it never leaks through `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};

/// Values that older clients wrote into the token slot instead of removing it.
const SENTINEL_TOKENS: &[&str] = &["undefined", "null"];

/// Short-lived bearer token authorizing API calls.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Parse a raw token string.
    ///
    /// Returns `None` for empty or whitespace-only input and for the sentinel
    /// strings `"undefined"` and `"null"`; callers treat those as an absent
    /// credential.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || SENTINEL_TOKENS.contains(&trimmed) {
            return None;
        }
        Some(Self(SecretString::from(trimmed.to_owned())))
    }

    /// Get the raw token value for the `Authorization` header or storage.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Format the value of an `Authorization` header.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for AccessToken {}
