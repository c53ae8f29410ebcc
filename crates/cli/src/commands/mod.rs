//! CLI command implementations.

pub mod auth;
pub mod cart;
pub mod request;

use std::sync::Arc;

use shopfront_client::{ApiError, ClientConfig, ConfigError, FileStore, Shopfront, StoreError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The state directory could not be opened.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A request body was not valid JSON.
    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// An argument could not be interpreted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Open the client over the configured state directory.
pub fn open(config: ClientConfig) -> Result<Shopfront, CliError> {
    let store = Arc::new(FileStore::open(&config.storage_dir)?);
    tracing::debug!(dir = %store.dir().display(), "Opened state directory");
    Ok(Shopfront::open(config, store)?)
}

/// Tell the user to log in again if the session was ended by a failed refresh.
pub fn report_session_expiry(shop: &Shopfront) {
    if let Some(redirect_to) = shop.handle_session_expired() {
        tracing::warn!(redirect_to = %redirect_to, "Session expired, please log in again");
    }
}
