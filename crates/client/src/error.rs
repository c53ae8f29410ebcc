//! Error types for request dispatch and token refresh.
//!
//! Transport and authentication failures are resolved inside the dispatcher;
//! what reaches callers is one of the variants of [`ApiError`].

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by [`ApiClient`](crate::ApiClient) calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The login endpoint rejected the supplied credentials.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The access token expired and could not be refreshed.
    #[error("Session expired: {0}")]
    SessionExpired(#[from] RefreshError),

    /// The API answered with a non-success status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Server-provided message, or a generic fallback.
        message: String,
    },

    /// A success response did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An authentication response carried no usable access token.
    #[error("Missing access token in {0} response")]
    MissingToken(&'static str),

    /// The endpoint could not be joined onto the API base URL.
    #[error("Invalid endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        /// The endpoint as passed by the caller.
        endpoint: String,
        /// Underlying URL parse error.
        source: url::ParseError,
    },
}

impl ApiError {
    /// HTTP status associated with this error, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Whether this error ended the session (the caller should re-authenticate).
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}

/// Outcome of a failed refresh cycle, shared by the leader and every waiter.
///
/// `Clone` so a single failure can be delivered to all queued callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or a generic fallback.
        message: String,
    },

    /// The refresh request failed in transport.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refresh call did not settle in time.
    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The refresh endpoint answered 2xx without a usable token.
    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),

    /// The leading caller was cancelled before the refresh settled.
    #[error("refresh abandoned before completion")]
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_displays_server_message() {
        let err = ApiError::Status {
            status: StatusCode::CONFLICT,
            message: "Email already registered".to_string(),
        };
        assert_eq!(err.to_string(), "Email already registered");
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert!(!err.is_session_expired());
    }

    #[test]
    fn test_session_expired_wraps_refresh_error() {
        let err = ApiError::from(RefreshError::Rejected {
            status: 401,
            message: "refresh token revoked".to_string(),
        });
        assert!(err.is_session_expired());
        assert_eq!(
            err.to_string(),
            "Session expired: refresh rejected with status 401: refresh token revoked"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = RefreshError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "refresh timed out after 10s");
    }
}
