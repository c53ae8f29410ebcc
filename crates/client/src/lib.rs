//! Shopfront client library.
//!
//! The client-side session and cart-consistency layer of the storefront:
//!
//! - [`api`] - Request dispatcher with bearer-token injection and a
//!   single-flight token refresh
//! - [`cart`] - Write-through cart state per scope, and the guest/user
//!   reconciliation run on login and logout
//! - [`session`] - Access token slot and session lifecycle events
//! - [`storage`] - Key/value persistence behind a small trait
//! - [`state`] - [`Shopfront`], the bundle handed to UI collaborators
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopfront_client::{ClientConfig, FileStore, Shopfront};
//!
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileStore::open(&config.storage_dir)?);
//! let shop = Shopfront::open(config, store)?;
//!
//! shop.login("ana@example.com", &password).await?;
//! let orders = shop.api().get("/api/orders").await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;

pub use api::{ApiClient, AuthUser};
pub use cart::CartManager;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, RefreshError};
pub use session::{Session, SessionEvent};
pub use state::Shopfront;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StoreError};
