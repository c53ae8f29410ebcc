//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! No external services are needed: [`FakeBackend`] serves the auth and API
//! endpoints in-process on an ephemeral port, and counts what it receives
//! so tests can assert on refresh traffic.
//!
//! # Test Categories
//!
//! - `dispatch` - Bearer injection, refresh-and-retry, error passthrough
//! - `session` - Login, register, logout and forced logout
//! - `cart_identity` - Guest/user cart reconciliation through a real login

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use shopfront_client::ClientConfig;
use tokio::task::JoinHandle;
use url::Url;

/// Email of the account the backend knows.
pub const USER_EMAIL: &str = "ana@example.com";
/// Password of the account the backend knows.
pub const USER_PASSWORD: &str = "correct-horse";
/// Id of the account the backend knows.
pub const USER_ID: &str = "42";
/// Email the backend reports as already registered.
pub const TAKEN_EMAIL: &str = "taken@example.com";
/// Email the backend refuses to register with a 401.
pub const BLOCKED_EMAIL: &str = "blocked@example.com";

const REFRESH_COOKIE: &str = "refresh_token=valid; HttpOnly; Path=/";
const CLEARED_COOKIE: &str = "refresh_token=; Max-Age=0; Path=/";

/// Counters and switches shared with the handlers.
#[derive(Default)]
struct BackendState {
    token_version: AtomicUsize,
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    protected_calls: AtomicUsize,
    refresh_delay_ms: AtomicU64,
    profile_delay_ms: AtomicU64,
    fail_refresh: AtomicBool,
    reject_protected: AtomicBool,
}

impl BackendState {
    fn current_token(&self) -> String {
        token_for(self.token_version.load(Ordering::SeqCst))
    }

    /// The bearer token of `headers`, if it is the current one.
    fn authorized(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;

        if self.reject_protected.load(Ordering::SeqCst) || token != self.current_token() {
            return None;
        }
        Some(token.to_owned())
    }
}

fn token_for(version: usize) -> String {
    format!("access-{version}")
}

/// An in-process storefront backend.
///
/// Access tokens are `access-<n>`; only the latest one is accepted. A
/// successful refresh issues the next one. The server task is aborted when
/// the backend is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start the backend on an ephemeral localhost port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/api/profile", get(profile))
            .route("/api/orders/{id}", get(order))
            .route("/api/cart/items/{id}", delete(delete_cart_item))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    /// Base URL of the backend.
    ///
    /// # Panics
    ///
    /// Never in practice; a socket address always forms a valid URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("socket address is a valid URL")
    }

    /// Client configuration pointing at this backend.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url())
    }

    /// Number of refresh calls received.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of login calls received.
    #[must_use]
    pub fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    /// Number of logout calls received.
    #[must_use]
    pub fn logout_calls(&self) -> usize {
        self.state.logout_calls.load(Ordering::SeqCst)
    }

    /// Number of calls to protected `/api` endpoints received.
    #[must_use]
    pub fn protected_calls(&self) -> usize {
        self.state.protected_calls.load(Ordering::SeqCst)
    }

    /// The access token the backend currently accepts.
    #[must_use]
    pub fn current_token(&self) -> String {
        self.state.current_token()
    }

    /// Invalidate every issued access token. The refresh cookie stays valid.
    pub fn expire_access_tokens(&self) {
        self.state.token_version.fetch_add(1, Ordering::SeqCst);
    }

    /// Make each refresh call take `delay` before answering.
    pub fn set_refresh_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.refresh_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Make each profile call wait `delay` before checking its token.
    pub fn set_profile_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.profile_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Make refresh calls fail with 401.
    pub fn fail_refresh(&self, fail: bool) {
        self.state.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Make protected endpoints reject every token.
    pub fn reject_protected(&self, reject: bool) {
        self.state.reject_protected.store(reject, Ordering::SeqCst);
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Handlers
// =============================================================================

type AppState = State<Arc<BackendState>>;

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": status.as_u16(), "message": message })),
    )
        .into_response()
}

async fn login(State(state): AppState, Json(body): Json<LoginBody>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    if body.email != USER_EMAIL || body.password != USER_PASSWORD {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }

    (
        [(header::SET_COOKIE, REFRESH_COOKIE)],
        Json(json!({
            "accessToken": state.current_token(),
            "user": { "_id": USER_ID, "name": "Ana", "email": USER_EMAIL, "role": "customer" },
        })),
    )
        .into_response()
}

async fn register(State(state): AppState, Json(body): Json<RegisterBody>) -> Response {
    if body.email == TAKEN_EMAIL {
        return error_response(StatusCode::CONFLICT, "Email already registered");
    }
    if body.email == BLOCKED_EMAIL {
        return error_response(StatusCode::UNAUTHORIZED, "Registration is closed");
    }

    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, REFRESH_COOKIE)],
        Json(json!({
            "accessToken": state.current_token(),
            "user": { "_id": "new-1", "name": body.name, "email": body.email, "role": "customer" },
        })),
    )
        .into_response()
}

async fn refresh(State(state): AppState, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let has_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains("refresh_token=valid"));
    if !has_cookie || state.fail_refresh.load(Ordering::SeqCst) {
        return error_response(StatusCode::UNAUTHORIZED, "Refresh token expired");
    }

    let version = state.token_version.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "accessToken": token_for(version) })).into_response()
}

async fn logout(State(state): AppState) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, CLEARED_COOKIE)]).into_response()
}

async fn profile(State(state): AppState, headers: HeaderMap) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.profile_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    match state.authorized(&headers) {
        Some(token) => Json(json!({ "id": USER_ID, "token": token })).into_response(),
        None => error_response(StatusCode::UNAUTHORIZED, "Token expired"),
    }
}

async fn order(State(state): AppState, headers: HeaderMap) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);

    if state.authorized(&headers).is_none() {
        return error_response(StatusCode::UNAUTHORIZED, "Token expired");
    }
    error_response(StatusCode::NOT_FOUND, "Order not found")
}

async fn delete_cart_item(State(state): AppState, headers: HeaderMap) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);

    if state.authorized(&headers).is_none() {
        return error_response(StatusCode::UNAUTHORIZED, "Token expired");
    }
    StatusCode::NO_CONTENT.into_response()
}
