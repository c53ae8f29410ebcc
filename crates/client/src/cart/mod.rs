//! Cart state for the active scope.
//!
//! [`CartManager`] owns the in-memory items of exactly one [`CartScope`] and
//! writes the scope's record through to the store on every mutation, before
//! the mutator returns. Storage failures are logged and swallowed: the
//! in-memory cart stays authoritative so a storage fault never blocks
//! shopping.
//!
//! Identity changes (login/logout) go through
//! [`CartManager::identify_user`].

mod identity;
pub mod merge;

pub use merge::{MergeSummary, merge_into};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use shopfront_core::{CartItem, CartKey, CartRecord, CartScope, CatalogItem, CheckoutLine};

use crate::storage::KeyValueStore;

/// The active scope and its items.
struct CartState {
    scope: CartScope,
    items: Vec<CartItem>,
}

/// Write-through cart for the active scope.
pub struct CartManager {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<CartState>,
}

impl CartManager {
    /// Open the cart with the guest scope active.
    #[must_use]
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        Self::open_scope(store, CartScope::Guest)
    }

    /// Open the cart with `scope` active, loading its stored items.
    #[must_use]
    pub fn open_scope(store: Arc<dyn KeyValueStore>, scope: CartScope) -> Self {
        let items = load_items(store.as_ref(), &scope);
        Self {
            store,
            state: Mutex::new(CartState { scope, items }),
        }
    }

    /// The active scope.
    #[must_use]
    pub fn scope(&self) -> CartScope {
        self.lock().scope.clone()
    }

    /// Snapshot of the active scope's items, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().items.clone()
    }

    /// The line stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &CartKey) -> Option<CartItem> {
        self.lock().items.iter().find(|i| &i.key == key).cloned()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a catalog entity, optionally for one variant.
    ///
    /// An existing line with the same key has its quantity increased; a new
    /// line freezes the current price. Adding zero is a no-op. Returns the
    /// line's key.
    pub fn add_item(&self, item: &CatalogItem, quantity: u32, variant: Option<&str>) -> CartKey {
        let line = CartItem::from_catalog(item, quantity, variant, Utc::now());
        let key = line.key.clone();
        if quantity == 0 {
            debug!(key = %key, "Ignoring add of zero quantity");
            return key;
        }

        self.mutate(|items| {
            if let Some(existing) = items.iter_mut().find(|i| i.key == line.key) {
                existing.quantity = existing.quantity.saturating_add(quantity);
            } else {
                items.push(line);
            }
        });
        key
    }

    /// Add one unit of a catalog entity with no variant.
    pub fn add_one(&self, item: &CatalogItem) -> CartKey {
        self.add_item(item, 1, None)
    }

    /// Remove the line under `key`. Returns whether a line was removed.
    pub fn remove_item(&self, key: &CartKey) -> bool {
        self.mutate(|items| {
            let before = items.len();
            items.retain(|i| &i.key != key);
            items.len() != before
        })
    }

    /// Set the quantity of the line under `key`.
    ///
    /// A quantity of zero or less removes the line. Unknown keys are ignored.
    /// Returns whether the cart changed.
    pub fn update_quantity(&self, key: &CartKey, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove_item(key);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        self.mutate(|items| {
            items
                .iter_mut()
                .find(|i| &i.key == key)
                .is_some_and(|line| {
                    line.quantity = quantity;
                    true
                })
        })
    }

    /// Empty the active scope and persist the empty record.
    pub fn clear(&self) {
        self.mutate(Vec::clear);
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lock()
            .items
            .iter()
            .map(|i| u64::from(i.quantity))
            .sum()
    }

    /// Sum of unit price times quantity across all lines.
    #[must_use]
    pub fn cart_total(&self) -> Decimal {
        self.lock().items.iter().map(CartItem::line_total).sum()
    }

    /// The cart as the order endpoint expects it.
    #[must_use]
    pub fn checkout_lines(&self) -> Vec<CheckoutLine> {
        self.lock()
            .items
            .iter()
            .map(CartItem::checkout_line)
            .collect()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply `f` to the active items and persist the result.
    ///
    /// The lock is held across the write, so mutations are serialized and
    /// each one is saved before the next starts.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<CartItem>) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state.items);
        save_items(self.store.as_ref(), &state.scope, &state.items);
        result
    }

    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CartManager")
            .field("scope", &state.scope)
            .field("lines", &state.items.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Persistence helpers
// =============================================================================

/// Read a scope's items; missing, unreadable or unparseable records read as empty.
fn load_items(store: &dyn KeyValueStore, scope: &CartScope) -> Vec<CartItem> {
    let raw = match store.get(&scope.storage_key()) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(scope = %scope, error = %e, "Failed to read cart, starting empty");
            return Vec::new();
        }
    };

    match CartRecord::from_json(&raw) {
        Ok(record) => record.items,
        Err(e) => {
            warn!(scope = %scope, error = %e, "Discarding unreadable cart record");
            Vec::new()
        }
    }
}

/// Write a scope's items; failures are logged and swallowed.
fn save_items(store: &dyn KeyValueStore, scope: &CartScope, items: &[CartItem]) {
    let record = CartRecord::new(items.to_vec());
    let result = record
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|json| {
            store
                .set(&scope.storage_key(), &json)
                .map_err(|e| e.to_string())
        });

    if let Err(e) = result {
        warn!(scope = %scope, error = %e, "Failed to persist cart, keeping in-memory state");
    }
}

/// Delete a scope's record; failures are logged and swallowed.
fn remove_record(store: &dyn KeyValueStore, scope: &CartScope) {
    if let Err(e) = store.remove(&scope.storage_key()) {
        warn!(scope = %scope, error = %e, "Failed to remove cart record");
    }
}
