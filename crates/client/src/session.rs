//! Access token slot and session lifecycle events.
//!
//! The token is cached in memory and written through to the store under
//! [`keys::TOKEN`]. A store failure is logged and the in-memory value stays
//! authoritative for the rest of the process.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, warn};

use shopfront_core::AccessToken;

use crate::storage::{KeyValueStore, keys};

/// Session lifecycle, published to UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// No credential has been issued in this process yet.
    Anonymous,
    /// A login or registration issued a new access token.
    LoggedIn,
    /// The user logged out.
    LoggedOut,
    /// The refresh credential was rejected; the user must re-authenticate.
    Expired {
        /// Re-authentication entry point to navigate to.
        redirect_to: String,
    },
}

/// Holder of the current access token.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    token: RwLock<Option<AccessToken>>,
    events: watch::Sender<SessionEvent>,
}

impl Session {
    /// Create a session, loading any persisted token from `store`.
    ///
    /// Empty and sentinel values (`"undefined"`, `"null"`) load as absent.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let token = match store.get(keys::TOKEN) {
            Ok(raw) => raw.as_deref().and_then(AccessToken::parse),
            Err(e) => {
                warn!(error = %e, "Failed to load persisted access token");
                None
            }
        };
        let (events, _) = watch::channel(SessionEvent::Anonymous);

        Self {
            store,
            token: RwLock::new(token),
            events,
        }
    }

    /// The current access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether an access token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replace the access token and persist it.
    pub fn set_access_token(&self, token: AccessToken) {
        if let Err(e) = self.store.set(keys::TOKEN, token.expose()) {
            warn!(error = %e, "Failed to persist access token");
        }
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        debug!("Access token updated");
    }

    /// Drop the access token from memory and storage.
    pub fn clear_access_token(&self) {
        if let Err(e) = self.store.remove(keys::TOKEN) {
            warn!(error = %e, "Failed to remove persisted access token");
        }
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Subscribe to session lifecycle events.
    ///
    /// The receiver starts at the most recent event.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The most recent session event.
    #[must_use]
    pub fn last_event(&self) -> SessionEvent {
        self.events.borrow().clone()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        self.events.send_replace(event);
    }

    /// Forced logout after an unrecoverable refresh failure.
    pub(crate) fn expire(&self, redirect_to: &str) {
        self.clear_access_token();
        self.publish(SessionEvent::Expired {
            redirect_to: redirect_to.to_owned(),
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("last_event", &self.last_event())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_loads_persisted_token() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::TOKEN, "persisted").unwrap();

        let session = Session::new(store);
        assert_eq!(session.access_token().unwrap().expose(), "persisted");
    }

    #[test]
    fn test_sentinel_token_loads_as_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::TOKEN, "undefined").unwrap();

        let session = Session::new(store);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_set_and_clear_write_through() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(store.clone());

        session.set_access_token(AccessToken::parse("fresh").unwrap());
        assert_eq!(store.get(keys::TOKEN).unwrap().as_deref(), Some("fresh"));

        session.clear_access_token();
        assert!(!store.contains(keys::TOKEN));
        assert!(session.access_token().is_none());
    }

    #[test]
    fn test_expire_clears_and_publishes() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(store.clone());
        session.set_access_token(AccessToken::parse("stale").unwrap());
        let events = session.subscribe();

        session.expire("/login?expired=true");

        assert!(!session.is_authenticated());
        assert!(!store.contains(keys::TOKEN));
        assert_eq!(
            *events.borrow(),
            SessionEvent::Expired {
                redirect_to: "/login?expired=true".to_string()
            }
        );
    }
}
