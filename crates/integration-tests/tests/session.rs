//! Session lifecycle against the fake backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::SecretString;
use shopfront_client::storage::keys;
use shopfront_client::{ApiClient, ApiError, KeyValueStore, MemoryStore, SessionEvent};
use shopfront_integration_tests::{FakeBackend, TAKEN_EMAIL, USER_EMAIL, USER_ID, USER_PASSWORD};

fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

#[tokio::test]
async fn test_login_stores_token_and_publishes_event() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let api = ApiClient::new(&backend.config(), store.clone()).unwrap();
    let events = api.session_events();

    let user = api
        .login(USER_EMAIL, &password(USER_PASSWORD))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.id.as_str(), USER_ID);
    assert_eq!(
        store.get(keys::TOKEN).unwrap(),
        Some(backend.current_token())
    );
    assert_eq!(*events.borrow(), SessionEvent::LoggedIn);
    assert!(store.contains(keys::COOKIES));
}

#[tokio::test]
async fn test_persisted_token_survives_restart() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    ApiClient::new(&backend.config(), store.clone())
        .unwrap()
        .login(USER_EMAIL, &password(USER_PASSWORD))
        .await
        .unwrap();

    let restarted = ApiClient::new(&backend.config(), store).unwrap();
    let body = restarted.get("/api/profile").await.unwrap().unwrap();

    assert_eq!(body["id"], USER_ID);
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_saved_refresh_cookie_survives_restart() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    ApiClient::new(&backend.config(), store.clone())
        .unwrap()
        .login(USER_EMAIL, &password(USER_PASSWORD))
        .await
        .unwrap();
    backend.expire_access_tokens();

    let restarted = ApiClient::new(&backend.config(), store.clone()).unwrap();
    let body = restarted.get("/api/profile").await.unwrap().unwrap();

    assert_eq!(body["token"], backend.current_token());
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(
        store.get(keys::TOKEN).unwrap(),
        Some(backend.current_token())
    );
}

#[tokio::test]
async fn test_refresh_failure_forces_logout() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let api = ApiClient::new(&backend.config(), store.clone()).unwrap();
    api.login(USER_EMAIL, &password(USER_PASSWORD))
        .await
        .unwrap();
    backend.fail_refresh(true);
    backend.expire_access_tokens();

    let err = api.get("/api/profile").await.unwrap_err();

    assert!(err.is_session_expired());
    assert!(!api.session().is_authenticated());
    assert!(!store.contains(keys::TOKEN));
    assert_eq!(
        api.session().last_event(),
        SessionEvent::Expired {
            redirect_to: "/login?expired=true".to_string()
        }
    );
}

#[tokio::test]
async fn test_refresh_without_cookie_fails() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    store.set(keys::TOKEN, "access-stale").unwrap();

    // A token from an earlier process, but no refresh cookie in this one
    let api = ApiClient::new(&backend.config(), store).unwrap();
    let err = api.get("/api/profile").await.unwrap_err();

    assert!(err.is_session_expired());
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_register_logs_in() {
    let backend = FakeBackend::start().await.unwrap();
    let api = ApiClient::new(&backend.config(), Arc::new(MemoryStore::new())).unwrap();

    let user = api
        .register("Bo", "bo@example.com", &password("s3cret-pass"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.id.as_str(), "new-1");
    assert!(api.session().is_authenticated());
}

#[tokio::test]
async fn test_register_conflict_is_a_business_error() {
    let backend = FakeBackend::start().await.unwrap();
    let api = ApiClient::new(&backend.config(), Arc::new(MemoryStore::new())).unwrap();

    let err = api
        .register("Bo", TAKEN_EMAIL, &password("s3cret-pass"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { .. }));
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(err.to_string(), "Email already registered");
    assert!(!api.session().is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_local_session() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let api = ApiClient::new(&backend.config(), store.clone()).unwrap();
    api.login(USER_EMAIL, &password(USER_PASSWORD))
        .await
        .unwrap();

    api.logout().await;

    assert_eq!(backend.logout_calls(), 1);
    assert!(!api.session().is_authenticated());
    assert!(!store.contains(keys::TOKEN));
    assert!(!store.contains(keys::COOKIES));
    assert_eq!(api.session().last_event(), SessionEvent::LoggedOut);
}
