//! The client bundle handed to UI collaborators.

use std::sync::Arc;

use reqwest::Method;
use secrecy::SecretString;
use serde_json::Value;
use tracing::{info, instrument, warn};

use shopfront_core::{CartScope, IdentityId};

use crate::api::{ApiClient, AuthUser};
use crate::cart::CartManager;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::SessionEvent;
use crate::storage::{KeyValueStore, keys};

/// API client, cart and store sharing one persisted identity.
///
/// This struct is cheaply cloneable via `Arc`. Login, registration and
/// logout go through it so the cart scope follows the session.
#[derive(Clone)]
pub struct Shopfront {
    inner: Arc<ShopfrontInner>,
}

struct ShopfrontInner {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    api: ApiClient,
    cart: CartManager,
}

impl Shopfront {
    /// Open the client over `store`.
    ///
    /// The cart starts in the scope of the identity remembered from the last
    /// login, or the guest scope if there is none. A remembered identity
    /// without an access token belongs to a session that was ended by a
    /// failed refresh; it is forgotten and the cart opens as guest.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::new`].
    pub fn open(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config, store.clone())?;
        let scope = match remembered_identity(store.as_ref()) {
            Some(id) if api.session().is_authenticated() => CartScope::User(id),
            Some(id) => {
                info!(user_id = %id, "Session ended without logout, opening guest cart");
                if let Err(e) = store.remove(keys::IDENTITY) {
                    warn!(error = %e, "Failed to forget identity");
                }
                CartScope::Guest
            }
            None => CartScope::Guest,
        };
        let cart = CartManager::open_scope(store.clone(), scope);

        Ok(Self {
            inner: Arc::new(ShopfrontInner {
                config,
                store,
                api,
                cart,
            }),
        })
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the cart.
    #[must_use]
    pub fn cart(&self) -> &CartManager {
        &self.inner.cart
    }

    /// Send a request through the API client.
    ///
    /// If the call ends the session (the refresh credential was rejected),
    /// the cart is switched to the guest scope before the error is returned.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub async fn dispatch(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let result = self.inner.api.dispatch(endpoint, method, body).await;
        if matches!(&result, Err(e) if e.is_session_expired()) {
            self.handle_session_expired();
        }
        result
    }

    /// Log in and move the guest cart into the user's cart.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::login`].
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<AuthUser>, ApiError> {
        let user = self.inner.api.login(email, password).await?;
        match &user {
            Some(user) => self.adopt_identity(&user.id),
            None => warn!("Login response carried no identity, cart stays in current scope"),
        }
        Ok(user)
    }

    /// Register, and if the server logs the new account in, reconcile the cart.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::register`].
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<AuthUser>, ApiError> {
        let user = self.inner.api.register(name, email, password).await?;
        if let Some(user) = &user {
            if self.inner.api.session().is_authenticated() {
                self.adopt_identity(&user.id);
            }
        }
        Ok(user)
    }

    /// Log out and switch the cart back to the guest scope.
    ///
    /// The user's saved cart stays in storage for their next login.
    pub async fn logout(&self) {
        self.inner.api.logout().await;
        self.forget_identity();
    }

    /// Apply a forced logout to the cart.
    ///
    /// If the session expired (the refresh credential was rejected), switch
    /// the cart to the guest scope and return the re-authentication path the
    /// UI should navigate to.
    pub fn handle_session_expired(&self) -> Option<String> {
        match self.inner.api.session().last_event() {
            SessionEvent::Expired { redirect_to } => {
                if self.inner.cart.scope() != CartScope::Guest {
                    self.forget_identity();
                }
                Some(redirect_to)
            }
            _ => None,
        }
    }

    fn adopt_identity(&self, id: &IdentityId) {
        self.inner.cart.identify_user(Some(id.clone()));
        if let Err(e) = self.inner.store.set(keys::IDENTITY, id.as_str()) {
            warn!(error = %e, "Failed to remember identity");
        }
        info!(user_id = %id, "Cart switched to user scope");
    }

    fn forget_identity(&self) {
        self.inner.cart.identify_user(None);
        if let Err(e) = self.inner.store.remove(keys::IDENTITY) {
            warn!(error = %e, "Failed to forget identity");
        }
    }
}

impl std::fmt::Debug for Shopfront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shopfront")
            .field("api", &self.inner.api)
            .field("cart", &self.inner.cart)
            .finish_non_exhaustive()
    }
}

fn remembered_identity(store: &dyn KeyValueStore) -> Option<IdentityId> {
    match store.get(keys::IDENTITY) {
        Ok(raw) => raw
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .map(IdentityId::from),
        Err(e) => {
            warn!(error = %e, "Failed to read remembered identity");
            None
        }
    }
}
