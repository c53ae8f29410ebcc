//! Guest/user cart reconciliation through a real login and logout.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use reqwest::Method;
use rust_decimal::Decimal;
use secrecy::SecretString;
use shopfront_client::storage::keys;
use shopfront_client::{CartManager, KeyValueStore, MemoryStore, Shopfront};
use shopfront_core::{
    CartItemKind, CartKey, CartRecord, CartScope, CatalogId, CatalogItem, IdentityId,
};
use shopfront_integration_tests::{FakeBackend, USER_EMAIL, USER_ID, USER_PASSWORD};

fn product(id: i64) -> CatalogItem {
    CatalogItem {
        kind: CartItemKind::Product,
        id: CatalogId::new(id),
        name: format!("Product {id}"),
        price: Decimal::new(2000, 2),
        image: None,
    }
}

fn user_scope() -> CartScope {
    CartScope::User(IdentityId::new(USER_ID))
}

fn stored_quantity(store: &MemoryStore, scope: &CartScope, key: &str) -> Option<u32> {
    let raw = store.get(&scope.storage_key()).unwrap()?;
    CartRecord::from_json(&raw)
        .unwrap()
        .items
        .into_iter()
        .find(|i| i.key.as_str() == key)
        .map(|i| i.quantity)
}

async fn login(shop: &Shopfront) {
    shop.login(USER_EMAIL, &SecretString::from(USER_PASSWORD.to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_login_merges_guest_cart_into_saved_cart() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());

    // The account already has two of product 7 from an earlier session
    CartManager::open_scope(store.clone(), user_scope()).add_item(&product(7), 2, None);

    let shop = Shopfront::open(backend.config(), store.clone()).unwrap();
    shop.cart().add_one(&product(7));
    login(&shop).await;

    assert_eq!(shop.cart().scope(), user_scope());
    assert_eq!(
        shop.cart().get(&CartKey::from("product-7")).unwrap().quantity,
        3
    );
    assert_eq!(stored_quantity(&store, &user_scope(), "product-7"), Some(3));
    assert!(!store.contains(&CartScope::Guest.storage_key()));
    assert_eq!(store.get(keys::IDENTITY).unwrap().as_deref(), Some(USER_ID));
}

#[tokio::test]
async fn test_failed_login_keeps_guest_cart() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let shop = Shopfront::open(backend.config(), store.clone()).unwrap();
    shop.cart().add_item(&product(1), 2, None);

    let result = shop
        .login(USER_EMAIL, &SecretString::from("wrong".to_string()))
        .await;

    assert!(result.is_err());
    assert_eq!(shop.cart().scope(), CartScope::Guest);
    assert_eq!(
        stored_quantity(&store, &CartScope::Guest, "product-1"),
        Some(2)
    );
}

#[tokio::test]
async fn test_logout_returns_to_guest_and_keeps_saved_cart() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let shop = Shopfront::open(backend.config(), store.clone()).unwrap();
    login(&shop).await;
    shop.cart().add_item(&product(4), 5, None);

    shop.logout().await;

    assert_eq!(shop.cart().scope(), CartScope::Guest);
    assert!(shop.cart().items().is_empty());
    assert_eq!(stored_quantity(&store, &user_scope(), "product-4"), Some(5));
    assert!(!store.contains(keys::IDENTITY));

    // Logging back in restores the saved cart without double counting
    login(&shop).await;
    assert_eq!(shop.cart().item_count(), 5);
}

#[tokio::test]
async fn test_reopen_resumes_user_cart() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let shop = Shopfront::open(backend.config(), store.clone()).unwrap();
    login(&shop).await;
    shop.cart().add_item(&product(8), 1, Some("Large"));
    drop(shop);

    let reopened = Shopfront::open(backend.config(), store).unwrap();

    assert_eq!(reopened.cart().scope(), user_scope());
    assert_eq!(reopened.cart().items()[0].key.as_str(), "product-8-large");
}

#[tokio::test]
async fn test_forced_logout_returns_cart_to_guest() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let shop = Shopfront::open(backend.config(), store.clone()).unwrap();
    login(&shop).await;
    shop.cart().add_one(&product(2));
    backend.fail_refresh(true);
    backend.expire_access_tokens();

    assert!(shop.api().get("/api/profile").await.is_err());
    let redirect = shop.handle_session_expired();

    assert_eq!(redirect.as_deref(), Some("/login?expired=true"));
    assert_eq!(shop.cart().scope(), CartScope::Guest);
    assert_eq!(stored_quantity(&store, &user_scope(), "product-2"), Some(1));
}

#[tokio::test]
async fn test_dispatch_applies_forced_logout_to_cart() {
    let backend = FakeBackend::start().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let shop = Shopfront::open(backend.config(), store.clone()).unwrap();
    login(&shop).await;
    backend.fail_refresh(true);
    backend.expire_access_tokens();

    let err = shop
        .dispatch("/api/profile", Method::GET, None)
        .await
        .unwrap_err();

    assert!(err.is_session_expired());
    assert_eq!(shop.cart().scope(), CartScope::Guest);
    assert!(!store.contains(keys::IDENTITY));

    // A later process starts in the guest scope too
    let reopened = Shopfront::open(backend.config(), store).unwrap();
    assert_eq!(reopened.cart().scope(), CartScope::Guest);
}
