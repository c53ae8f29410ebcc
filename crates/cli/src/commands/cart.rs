//! Cart commands. Every change is saved before the command exits.
//!
//! # Usage
//!
//! ```bash
//! shopfront cart add pack 3 "Starter Pack" 49.00 -v "Navy Blue"
//! shopfront cart update pack-3-navy_blue 2
//! shopfront cart remove pack-3-navy_blue
//! shopfront cart clear
//! ```

use rust_decimal::Decimal;
use shopfront_client::Shopfront;
use shopfront_core::{CartItemKind, CartKey, CatalogId, CatalogItem};

/// Print the active cart.
#[allow(clippy::print_stdout)]
pub fn show(shop: &Shopfront) {
    let cart = shop.cart();
    let items = cart.items();

    println!("Cart ({})", cart.scope());
    if items.is_empty() {
        println!("  (empty)");
        return;
    }

    for item in &items {
        println!(
            "  {:<28} {:>4} x {:>9} = {:>10}  {}",
            item.key,
            item.quantity,
            item.price,
            item.line_total(),
            item.name
        );
    }
    println!("  {} item(s), total {}", cart.item_count(), cart.cart_total());
}

/// Add a catalog item to the active cart.
#[allow(clippy::print_stdout)]
pub fn add(
    shop: &Shopfront,
    kind: CartItemKind,
    id: i64,
    name: String,
    price: Decimal,
    quantity: u32,
    variant: Option<&str>,
) {
    let item = CatalogItem {
        kind,
        id: CatalogId::new(id),
        name,
        price,
        image: None,
    };
    let key = shop.cart().add_item(&item, quantity, variant);

    match shop.cart().get(&key) {
        Some(line) => println!("{key}: {} in cart", line.quantity),
        None => println!("{key}: nothing added"),
    }
}

/// Remove a line from the active cart.
#[allow(clippy::print_stdout)]
pub fn remove(shop: &Shopfront, key: &str) {
    if shop.cart().remove_item(&CartKey::from(key)) {
        println!("Removed {key}");
    } else {
        println!("{key} is not in the cart");
    }
}

/// Set the quantity of a line in the active cart.
#[allow(clippy::print_stdout)]
pub fn update(shop: &Shopfront, key: &str, quantity: i64) {
    let key = CartKey::from(key);
    if !shop.cart().update_quantity(&key, quantity) {
        println!("{key} is not in the cart");
        return;
    }

    match shop.cart().get(&key) {
        Some(line) => println!("{key}: {} in cart", line.quantity),
        None => println!("Removed {key}"),
    }
}

/// Empty the active cart.
#[allow(clippy::print_stdout)]
pub fn clear(shop: &Shopfront) {
    shop.cart().clear();
    println!("Cart cleared");
}
