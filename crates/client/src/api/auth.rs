//! Authentication endpoints: login, registration, refresh and logout.
//!
//! Login, register and refresh are *authentication endpoints*: a 401/403 from
//! them is never treated as an expired session.

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use shopfront_core::{AccessToken, IdentityId};

use super::{ApiClient, error_message};
use crate::error::{ApiError, RefreshError};
use crate::session::SessionEvent;

/// Exchange credentials for an access token.
pub const LOGIN: &str = "/auth/login";
/// Create an account.
pub const REGISTER: &str = "/auth/register";
/// Exchange the refresh cookie for a new access token.
pub const REFRESH: &str = "/auth/refresh";
/// End the server-side session.
pub const LOGOUT: &str = "/auth/logout";

/// How the dispatcher treats an authorization failure from an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndpointKind {
    /// Wrong credentials, surfaced to the caller.
    Login,
    /// Register and refresh; failures are plain errors.
    AuthFlow,
    /// Everything else; a 401/403 means the access token expired.
    Protected,
}

/// Classify an endpoint path, ignoring query string and trailing slash.
pub(crate) fn classify(endpoint: &str) -> EndpointKind {
    let path = endpoint.split(['?', '#']).next().unwrap_or_default();
    let path = format!("/{}", path.trim_matches('/'));
    match path.as_str() {
        LOGIN => EndpointKind::Login,
        REGISTER | REFRESH => EndpointKind::AuthFlow,
        _ => EndpointKind::Protected,
    }
}

/// Request body for login.
#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Request body for registration.
#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Response from the login, register and refresh endpoints.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

/// The identity returned alongside a new access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    /// Document id of the identity.
    #[serde(alias = "_id")]
    pub id: IdentityId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Role (e.g. `customer`, `admin`).
    #[serde(default)]
    pub role: Option<String>,
}

impl ApiClient {
    /// Log in with email and password.
    ///
    /// Stores the issued access token and publishes `SessionEvent::LoggedIn`.
    /// Returns the identity the server reported, if any; pass it to
    /// `CartManager::identify_user` to reconcile the cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidCredentials` if the server rejects the
    /// credentials, `ApiError::MissingToken` if the success response has no
    /// usable token, or any other dispatch error.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<AuthUser>, ApiError> {
        let body = serde_json::to_value(LoginRequest {
            email,
            password: password.expose_secret(),
        })?;
        let response = self.dispatch(LOGIN, Method::POST, Some(&body)).await?;
        let user = self.accept_token_response(response, "login")?;

        info!(user_id = ?user.as_ref().map(|u| u.id.as_str()), "Logged in");
        Ok(user)
    }

    /// Register a new account.
    ///
    /// If the server issues an access token with the new account, the client
    /// is logged in as that identity.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with the server's message if registration is
    /// refused (e.g. the email is taken), or any other dispatch error.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<AuthUser>, ApiError> {
        let body = serde_json::to_value(RegisterRequest {
            name,
            email,
            password: password.expose_secret(),
        })?;
        let response = self.dispatch(REGISTER, Method::POST, Some(&body)).await?;

        let parsed: TokenResponse = match response {
            Some(value) => serde_json::from_value(value)?,
            None => return Ok(None),
        };
        if let Some(token) = parsed.access_token.as_deref().and_then(AccessToken::parse) {
            self.session().set_access_token(token);
            self.session().publish(SessionEvent::LoggedIn);
        }
        Ok(parsed.user)
    }

    /// Log out.
    ///
    /// The server call is best effort; the local token is cleared and
    /// `SessionEvent::LoggedOut` published whatever the server answers.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self.dispatch(LOGOUT, Method::POST, None).await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.session().clear_access_token();
        self.session().publish(SessionEvent::LoggedOut);
        info!("Logged out");
    }

    fn accept_token_response(
        &self,
        response: Option<serde_json::Value>,
        flow: &'static str,
    ) -> Result<Option<AuthUser>, ApiError> {
        let parsed: TokenResponse = serde_json::from_value(response.unwrap_or_default())
            .map_err(|_| ApiError::MissingToken(flow))?;
        let token = parsed
            .access_token
            .as_deref()
            .and_then(AccessToken::parse)
            .ok_or(ApiError::MissingToken(flow))?;

        self.session().set_access_token(token);
        self.session().publish(SessionEvent::LoggedIn);
        Ok(parsed.user)
    }
}

/// Call the refresh endpoint.
///
/// The refresh credential is an httpOnly cookie carried by the client's
/// cookie store; nothing is sent in the body.
///
/// # Errors
///
/// Returns `RefreshError::Transport` on network failure,
/// `RefreshError::Rejected` on a non-success status and
/// `RefreshError::MalformedResponse` if no usable token comes back.
#[instrument(skip(client, url))]
pub(crate) async fn request_refresh(
    client: &reqwest::Client,
    url: Url,
) -> Result<AccessToken, RefreshError> {
    let response = client
        .post(url)
        .send()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            message: error_message(status, &text),
        });
    }

    let parsed: TokenResponse =
        serde_json::from_str(&text).map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;
    parsed
        .access_token
        .as_deref()
        .and_then(AccessToken::parse)
        .ok_or_else(|| RefreshError::MalformedResponse("no access token in body".to_string()))
}

/// Whether `status` means the request was not authorized.
pub(crate) fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_endpoints() {
        assert_eq!(classify("/auth/login"), EndpointKind::Login);
        assert_eq!(classify("auth/login/"), EndpointKind::Login);
        assert_eq!(classify("/auth/login?next=/cart"), EndpointKind::Login);
        assert_eq!(classify("/auth/refresh"), EndpointKind::AuthFlow);
        assert_eq!(classify("/auth/register"), EndpointKind::AuthFlow);
    }

    #[test]
    fn test_classify_everything_else_as_protected() {
        assert_eq!(classify("/auth/logout"), EndpointKind::Protected);
        assert_eq!(classify("/api/orders"), EndpointKind::Protected);
        assert_eq!(classify("/api/auth/login-history"), EndpointKind::Protected);
    }

    #[test]
    fn test_auth_user_accepts_mongo_style_id() {
        let user: AuthUser =
            serde_json::from_str(r#"{"_id": "65f1c0", "name": "Ana", "role": "customer"}"#)
                .unwrap();
        assert_eq!(user.id.as_str(), "65f1c0");
        assert_eq!(user.name.as_deref(), Some("Ana"));
        assert_eq!(user.email, None);
    }

    #[test]
    fn test_is_auth_failure() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(is_auth_failure(StatusCode::FORBIDDEN));
        assert!(!is_auth_failure(StatusCode::NOT_FOUND));
    }
}
