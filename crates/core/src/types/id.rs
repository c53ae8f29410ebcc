//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe numeric ID wrappers that
//! prevent accidentally mixing IDs from different entity types. Identities
//! issued by the document store are opaque strings and use [`IdentityId`].

use core::fmt;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use shopfront_core::define_id;
/// define_id!(ReviewId);
/// define_id!(OrderId);
///
/// let review_id = ReviewId::new(1);
/// let order_id = OrderId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ReviewId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Catalog entities (products and packs share one id space per kind)
define_id!(CatalogId);

/// Identifier of an authenticated identity, as issued by the backend.
///
/// Document-store ids are opaque strings (`"42"`, `"65f1c0..."`), so this is
/// a string newtype rather than a numeric `define_id!` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Create a new identity ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for IdentityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for IdentityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_id_roundtrip() {
        let id = CatalogId::new(7);
        assert_eq!(id.as_i64(), 7);
        assert_eq!(i64::from(id), 7);
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn test_identity_id_serializes_as_plain_string() {
        let id = IdentityId::new("42");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"42\""));
        assert_eq!(id.to_string(), "42");
    }
}
