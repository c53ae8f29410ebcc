//! Cart reconciliation on login and logout.

use tracing::{debug, info, instrument};

use shopfront_core::{CartItem, CartScope, IdentityId};

use super::merge::merge_into;
use super::{CartManager, CartState, load_items, remove_record, save_items};

impl CartManager {
    /// Switch the cart to the scope of `identity`.
    ///
    /// With `Some(id)` the guest cart is merged into the user's saved cart
    /// (matching lines sum their quantities), the merged cart is saved, the
    /// guest record is removed and `user:<id>` becomes active. An empty guest
    /// cart skips the merge.
    ///
    /// With `None` the guest scope becomes active, freshly read from
    /// storage. The previous user's record is left untouched.
    ///
    /// Returns the scope now active.
    #[instrument(skip(self), fields(from = %self.scope()))]
    pub fn identify_user(&self, identity: Option<IdentityId>) -> CartScope {
        let mut state = self.lock();

        match identity {
            Some(id) => self.enter_user_scope(&mut state, id),
            None => {
                let items = load_items(self.store.as_ref(), &CartScope::Guest);
                debug!(lines = items.len(), "Switched to guest cart");
                state.scope = CartScope::Guest;
                state.items = items;
            }
        }

        state.scope.clone()
    }

    fn enter_user_scope(&self, state: &mut CartState, id: IdentityId) {
        let user_scope = CartScope::User(id);
        let store = self.store.as_ref();

        // In-memory lines are authoritative for the active scope
        let guest = self.read_scope(state, &CartScope::Guest);
        let mut user = self.read_scope(state, &user_scope);

        if guest.is_empty() {
            debug!(scope = %user_scope, lines = user.len(), "No guest lines to merge");
        } else {
            let summary = merge_into(&mut user, guest);
            save_items(store, &user_scope, &user);
            remove_record(store, &CartScope::Guest);
            info!(
                scope = %user_scope,
                summed = summary.summed,
                inserted = summary.inserted,
                "Merged guest cart"
            );
        }

        state.scope = user_scope;
        state.items = user;
    }

    fn read_scope(&self, state: &CartState, scope: &CartScope) -> Vec<CartItem> {
        if &state.scope == scope {
            state.items.clone()
        } else {
            load_items(self.store.as_ref(), scope)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use shopfront_core::{CartItemKind, CartKey, CartRecord, CatalogId, CatalogItem};

    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};

    fn product(id: i64) -> CatalogItem {
        CatalogItem {
            kind: CartItemKind::Product,
            id: CatalogId::new(id),
            name: format!("Product {id}"),
            price: Decimal::new(1250, 2),
            image: None,
        }
    }

    fn user(id: &str) -> CartScope {
        CartScope::User(IdentityId::new(id))
    }

    fn stored(store: &MemoryStore, scope: &CartScope) -> Option<Vec<(String, u32)>> {
        store.get(&scope.storage_key()).unwrap().map(|raw| {
            CartRecord::from_json(&raw)
                .unwrap()
                .items
                .into_iter()
                .map(|i| (i.key.to_string(), i.quantity))
                .collect()
        })
    }

    /// Save a cart for `scope` as a previous session would have.
    fn seed(store: &Arc<MemoryStore>, scope: CartScope, id: i64, quantity: u32) {
        CartManager::open_scope(store.clone(), scope).add_item(&product(id), quantity, None);
    }

    #[test]
    fn test_login_sums_matching_lines_and_clears_guest() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, user("42"), 7, 2);

        let cart = CartManager::open(store.clone());
        cart.add_one(&product(7));

        let scope = cart.identify_user(Some(IdentityId::new("42")));

        assert_eq!(scope, user("42"));
        assert_eq!(cart.get(&CartKey::from("product-7")).unwrap().quantity, 3);
        assert_eq!(
            stored(&store, &user("42")),
            Some(vec![("product-7".to_string(), 3)])
        );
        assert_eq!(stored(&store, &CartScope::Guest), None);
    }

    #[test]
    fn test_login_inserts_new_lines() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, user("42"), 1, 3);

        let cart = CartManager::open(store.clone());
        cart.add_one(&product(2));
        cart.identify_user(Some(IdentityId::new("42")));

        assert_eq!(
            stored(&store, &user("42")),
            Some(vec![
                ("product-1".to_string(), 3),
                ("product-2".to_string(), 1)
            ])
        );
    }

    #[test]
    fn test_login_with_empty_guest_keeps_user_cart() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, user("42"), 1, 3);

        let cart = CartManager::open(store.clone());
        cart.identify_user(Some(IdentityId::new("42")));

        assert_eq!(cart.item_count(), 3);
        assert_eq!(
            stored(&store, &user("42")),
            Some(vec![("product-1".to_string(), 3)])
        );
    }

    #[test]
    fn test_login_for_new_identity_adopts_guest_lines() {
        let store = Arc::new(MemoryStore::new());
        let cart = CartManager::open(store.clone());
        cart.add_item(&product(5), 2, None);

        cart.identify_user(Some(IdentityId::new("new")));

        assert_eq!(cart.item_count(), 2);
        assert_eq!(
            stored(&store, &user("new")),
            Some(vec![("product-5".to_string(), 2)])
        );
    }

    #[test]
    fn test_second_login_does_not_merge_twice() {
        let store = Arc::new(MemoryStore::new());
        let cart = CartManager::open(store.clone());
        cart.add_item(&product(7), 2, None);

        cart.identify_user(Some(IdentityId::new("42")));
        cart.identify_user(None);
        cart.identify_user(Some(IdentityId::new("42")));

        assert_eq!(cart.item_count(), 2);
        assert_eq!(
            stored(&store, &user("42")),
            Some(vec![("product-7".to_string(), 2)])
        );
    }

    #[test]
    fn test_logout_keeps_user_record() {
        let store = Arc::new(MemoryStore::new());
        let cart = CartManager::open_scope(store.clone(), user("42"));
        cart.add_item(&product(3), 4, None);

        let scope = cart.identify_user(None);

        assert_eq!(scope, CartScope::Guest);
        assert!(cart.items().is_empty());
        assert_eq!(
            stored(&store, &user("42")),
            Some(vec![("product-3".to_string(), 4)])
        );
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, user("42"), 1, 1);

        let cart = CartManager::open(store.clone());
        cart.add_one(&product(9));
        cart.clear();
        assert_eq!(
            stored(&store, &user("42")),
            Some(vec![("product-1".to_string(), 1)])
        );

        cart.identify_user(Some(IdentityId::new("42")));
        cart.update_quantity(&CartKey::from("product-1"), 6);
        assert_eq!(stored(&store, &CartScope::Guest), Some(Vec::new()));
    }

    #[test]
    fn test_switching_users_does_not_leak_lines() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, user("b"), 2, 1);

        let cart = CartManager::open_scope(store.clone(), user("a"));
        cart.add_one(&product(1));
        cart.identify_user(Some(IdentityId::new("b")));

        assert_eq!(
            cart.items()
                .into_iter()
                .map(|i| i.key.to_string())
                .collect::<Vec<_>>(),
            vec!["product-2".to_string()]
        );
        assert_eq!(
            stored(&store, &user("a")),
            Some(vec![("product-1".to_string(), 1)])
        );
    }
}
