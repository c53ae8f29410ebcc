//! Key/value persistence for session and cart state.
//!
//! Everything the client persists goes through [`KeyValueStore`]: the access
//! token under [`keys::TOKEN`], the refresh cookie under [`keys::COOKIES`],
//! the active identity under [`keys::IDENTITY`], and one cart record per
//! scope (see `CartScope::storage_key`).
//!
//! # Backends
//!
//! - [`MemoryStore`] - process-local, used in tests and for ephemeral sessions
//! - [`FileStore`] - one file per key in a directory, survives restarts

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Well-known storage keys.
pub mod keys {
    /// Key for the current access token.
    pub const TOKEN: &str = "token";

    /// Key for the identity whose cart scope is active.
    pub const IDENTITY: &str = "identity";

    /// Key for the cookies sent to the refresh endpoint.
    pub const COOKIES: &str = "cookies";
}

/// Errors that can occur when reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("storage I/O error on '{key}': {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backend is unavailable (e.g. quota exceeded, lock poisoned).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable string key/value storage.
///
/// Calls are synchronous: a write has either reached the backend or failed
/// by the time it returns.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
