//! Request dispatcher for the storefront REST API.
//!
//! Every API call goes through [`ApiClient::dispatch`], which:
//!
//! 1. Injects `Authorization: Bearer <token>` when a token is present
//! 2. Sends the call with a persisted cookie jar, so the httpOnly refresh
//!    cookie travels automatically, across restarts too
//! 3. On 401/403 from a protected endpoint, joins or leads a single-flight
//!    refresh and retries the identical call exactly once. If the token was
//!    already replaced while the call was in flight, it retries with the new
//!    token without refreshing again
//! 4. Maps any other non-success status to `ApiError::Status` with the
//!    server's message
//!
//! Callers never handle token refresh themselves.

pub mod auth;
mod cookies;
pub mod refresh;

pub use auth::AuthUser;
pub use refresh::RefreshCoordinator;

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, instrument};

use shopfront_core::AccessToken;

use crate::config::ClientConfig;
use crate::error::{ApiError, RefreshError};
use crate::session::{Session, SessionEvent};
use crate::storage::KeyValueStore;

use auth::{EndpointKind, classify, is_auth_failure, request_refresh};
use cookies::PersistentCookies;

/// Maximum number of characters of a raw error body surfaced as a message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Authenticated client for the storefront REST API.
///
/// Cheap to clone; clones share the session, cookie store and refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    config: ClientConfig,
    session: Session,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    /// Create a client whose token slot and refresh cookie are persisted in
    /// `store`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidEndpoint` if the refresh URL cannot be built
    /// from the configured API URL, or `ApiError::Http` if the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let refresh_url =
            config
                .endpoint_url(auth::REFRESH)
                .map_err(|source| ApiError::InvalidEndpoint {
                    endpoint: auth::REFRESH.to_owned(),
                    source,
                })?;
        let cookies = Arc::new(PersistentCookies::load(store.clone(), refresh_url));

        let client = reqwest::Client::builder()
            .cookie_provider(cookies)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                config: config.clone(),
                session: Session::new(store),
                refresh: RefreshCoordinator::new(config.refresh_timeout),
            }),
        })
    }

    /// The session holding the access token.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// The refresh coordinator shared by all clones of this client.
    #[must_use]
    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Subscribe to session lifecycle events (login, logout, forced expiry).
    #[must_use]
    pub fn session_events(&self) -> watch::Receiver<SessionEvent> {
        self.inner.session.subscribe()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Send a request and return its JSON body.
    ///
    /// Returns `Ok(None)` for 204 or an empty success body.
    ///
    /// # Errors
    ///
    /// - `ApiError::InvalidCredentials` for a 401/403 from the login endpoint
    /// - `ApiError::SessionExpired` if the access token expired and the
    ///   refresh failed
    /// - `ApiError::Status` for any other non-success status, including a
    ///   second 401/403 after a successful refresh
    /// - `ApiError::Http` on network failure
    #[instrument(skip(self, body), fields(method = %method, endpoint = %endpoint))]
    pub async fn dispatch(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let sent_with = self.inner.session.access_token();
        let response = self.send(endpoint, &method, body, sent_with.as_ref()).await?;
        let status = response.status();

        if is_auth_failure(status) {
            match classify(endpoint) {
                EndpointKind::Login => {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ApiError::InvalidCredentials(error_message(status, &text)));
                }
                EndpointKind::AuthFlow => {}
                EndpointKind::Protected => {
                    let current = self.inner.session.access_token();
                    let token = match current {
                        Some(token) if Some(&token) != sent_with.as_ref() => {
                            debug!(status = %status, "Access token replaced in flight, retrying");
                            token
                        }
                        _ => {
                            debug!(status = %status, "Access token rejected, refreshing session");
                            self.refresh_session().await?
                        }
                    };

                    let retried = self.send(endpoint, &method, body, Some(&token)).await?;
                    return read_body(retried).await;
                }
            }
        }

        read_body(response).await
    }

    /// Send a request and deserialize its JSON body into `T`.
    ///
    /// An empty body deserializes from `null`, so `T = Option<_>` or `()`
    /// accept 204 responses.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`dispatch`](Self::dispatch), or
    /// `ApiError::Parse` if the body does not match `T`.
    pub async fn dispatch_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let value = self.dispatch(endpoint, method, body).await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    /// `GET` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn get(&self, endpoint: &str) -> Result<Option<Value>, ApiError> {
        self.dispatch(endpoint, Method::GET, None).await
    }

    /// `POST` a JSON body to an endpoint.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Option<Value>, ApiError> {
        self.dispatch(endpoint, Method::POST, Some(body)).await
    }

    /// `PUT` a JSON body to an endpoint.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn put(&self, endpoint: &str, body: &Value) -> Result<Option<Value>, ApiError> {
        self.dispatch(endpoint, Method::PUT, Some(body)).await
    }

    /// `PATCH` an endpoint with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn patch(&self, endpoint: &str, body: &Value) -> Result<Option<Value>, ApiError> {
        self.dispatch(endpoint, Method::PATCH, Some(body)).await
    }

    /// `DELETE` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn delete(&self, endpoint: &str) -> Result<Option<Value>, ApiError> {
        self.dispatch(endpoint, Method::DELETE, None).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Issue one HTTP call, with `token` as the bearer if given.
    async fn send(
        &self,
        endpoint: &str,
        method: &Method,
        body: Option<&Value>,
        token: Option<&AccessToken>,
    ) -> Result<Response, ApiError> {
        let url = self
            .inner
            .config
            .endpoint_url(endpoint)
            .map_err(|source| ApiError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
                source,
            })?;

        let mut request = self.inner.client.request(method.clone(), url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token.bearer_header());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Join or lead a refresh cycle.
    ///
    /// The leader stores the new token before releasing waiters; on failure
    /// it forces a logout once, after every waiter has been rejected.
    async fn refresh_session(&self) -> Result<AccessToken, RefreshError> {
        let inner = &self.inner;
        inner
            .refresh
            .run(
                || async {
                    let url = inner
                        .config
                        .endpoint_url(auth::REFRESH)
                        .map_err(|e| RefreshError::Transport(e.to_string()))?;
                    let token = request_refresh(&inner.client, url).await?;
                    inner.session.set_access_token(token.clone());
                    Ok::<_, RefreshError>(token)
                },
                |e| {
                    error!(error = %e, "Token refresh failed, ending session");
                    inner.session.expire(&inner.config.session_expired_path);
                },
            )
            .await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("session", &self.inner.session)
            .field("refresh", &self.inner.refresh)
            .finish()
    }
}

/// Turn a response into its JSON body or a structured error.
async fn read_body(response: Response) -> Result<Option<Value>, ApiError> {
    let status = response.status();

    if status.is_success() {
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        return Ok(Some(serde_json::from_str(&text)?));
    }

    let text = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status,
        message: error_message(status, &text),
    })
}

/// Best-effort error message: the JSON `message` (or `error`) field, else the
/// raw body, else `API error: <status>`.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        let message = fields
            .get("message")
            .or_else(|| fields.get("error"))
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty());
        if let Some(message) = message {
            return message.to_owned();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("API error: {}", status.as_u16());
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
