//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod credential;
pub mod id;

pub use cart::{
    CART_RECORD_VERSION, CartItem, CartItemKind, CartKey, CartRecord, CartRecordError, CartScope,
    CatalogItem, CheckoutLine, UnknownItemKind,
};
pub use credential::AccessToken;
pub use id::*;
