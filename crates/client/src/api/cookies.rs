//! Cookie jar persisted through the key/value store.
//!
//! The refresh credential is an httpOnly cookie. [`PersistentCookies`] wraps
//! reqwest's [`Jar`] and writes the cookies sent to the refresh endpoint
//! through to [`keys::COOKIES`] whenever a response sets one, so a later
//! process can still refresh the session.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use tracing::warn;
use url::Url;

use crate::storage::{KeyValueStore, keys};

/// Cookie provider for the API client.
pub struct PersistentCookies {
    jar: Jar,
    store: Arc<dyn KeyValueStore>,
    /// URL whose cookies are persisted.
    scope: Url,
}

impl PersistentCookies {
    /// Build the jar, seeding it with the cookies saved for `scope`.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>, scope: Url) -> Self {
        let jar = Jar::default();
        match store.get(keys::COOKIES) {
            Ok(Some(saved)) => {
                for pair in saved.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                    jar.add_cookie_str(pair, &scope);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load persisted cookies"),
        }

        Self { jar, store, scope }
    }

    fn persist(&self) {
        let saved = self
            .jar
            .cookies(&self.scope)
            .and_then(|value| value.to_str().ok().map(str::to_owned));

        let result = match saved {
            Some(saved) => self.store.set(keys::COOKIES, &saved),
            None => self.store.remove(keys::COOKIES),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist cookies");
        }
    }
}

impl CookieStore for PersistentCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.jar.set_cookies(cookie_headers, url);
        self.persist();
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}
