//! Shopfront Core - Shared types library.
//!
//! This crate provides the domain types shared by the Shopfront components:
//! - `client` - Session, request dispatch and cart layer
//! - `cli` - Command-line front end over the client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, access tokens, cart items, scopes and records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
