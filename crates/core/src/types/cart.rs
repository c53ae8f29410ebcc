//! Cart domain types.
//!
//! A cart is an ordered list of [`CartItem`]s, unique by [`CartKey`], stored
//! per [`CartScope`] as a versioned [`CartRecord`].

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{CatalogId, IdentityId};

/// Current schema version written by [`CartRecord::to_json`].
pub const CART_RECORD_VERSION: u32 = 1;

/// Kind of catalog entity a cart line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartItemKind {
    /// A single product.
    Product,
    /// A bundle of products sold as one unit.
    Pack,
}

impl CartItemKind {
    /// Returns the lowercase name used in cart keys and payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Pack => "pack",
        }
    }
}

impl fmt::Display for CartItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`CartItemKind`].
#[derive(Debug, Clone, Error)]
#[error("unknown cart item kind: {0}")]
pub struct UnknownItemKind(pub String);

impl FromStr for CartItemKind {
    type Err = UnknownItemKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "pack" => Ok(Self::Pack),
            other => Err(UnknownItemKind(other.to_owned())),
        }
    }
}

/// Deterministic identity of a cart line.
///
/// Derived from kind + catalog id + optional variant, e.g. `product-1` or
/// `pack-3-navy_blue`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartKey(String);

impl CartKey {
    /// Derive the key for a catalog entity and optional variant selector.
    ///
    /// Variants are lowercased and inner whitespace becomes `_`; a blank
    /// variant is the same as no variant.
    #[must_use]
    pub fn derive(kind: CartItemKind, id: CatalogId, variant: Option<&str>) -> Self {
        match normalize_variant(variant) {
            Some(variant) => Self(format!("{kind}-{id}-{variant}")),
            None => Self(format!("{kind}-{id}")),
        }
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CartKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for CartKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

fn normalize_variant(variant: Option<&str>) -> Option<String> {
    let variant = variant?.trim();
    if variant.is_empty() {
        return None;
    }
    Some(
        variant
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase(),
    )
}

/// A catalog entity as handed to the cart by the UI.
///
/// The cart copies the display fields and freezes the price; it never keeps a
/// live reference back into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Product or pack.
    pub kind: CartItemKind,
    /// Catalog id of the entity.
    pub id: CatalogId,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Decimal,
    /// Display image URL.
    pub image: Option<String>,
}

/// One purchasable line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Line identity, derived from kind, catalog id and variant.
    pub key: CartKey,
    /// Whether the line is a product or a pack.
    pub kind: CartItemKind,
    /// Catalog reference, kept for display and checkout only.
    pub entity_id: CatalogId,
    /// Display name at add time.
    pub name: String,
    /// Unit price frozen at add time.
    pub price: Decimal,
    /// Display image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Variant selector the line was added with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Always at least 1.
    pub quantity: u32,
    /// When the line was first added.
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Build a new cart line from a catalog entity.
    ///
    /// `quantity` is raised to 1 if zero is passed.
    #[must_use]
    pub fn from_catalog(
        item: &CatalogItem,
        quantity: u32,
        variant: Option<&str>,
        added_at: DateTime<Utc>,
    ) -> Self {
        let variant = variant
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned);
        Self {
            key: CartKey::derive(item.kind, item.id, variant.as_deref()),
            kind: item.kind,
            entity_id: item.id,
            name: item.name.clone(),
            price: item.price,
            image: item.image.clone(),
            variant,
            quantity: quantity.max(1),
            added_at,
        }
    }

    /// Unit price multiplied by quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// The line as submitted to the order endpoint.
    #[must_use]
    pub fn checkout_line(&self) -> CheckoutLine {
        CheckoutLine {
            kind: self.kind,
            id: self.entity_id,
            variant: self.variant.clone(),
            quantity: self.quantity,
        }
    }
}

/// A cart line in the shape the order endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub kind: CartItemKind,
    pub id: CatalogId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
}

/// A named, independently persisted cart partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartScope {
    /// The anonymous cart; exactly one per store.
    Guest,
    /// The cart of one authenticated identity.
    User(IdentityId),
}

impl CartScope {
    /// Storage key of this scope's [`CartRecord`].
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Guest => "cart:guest".to_string(),
            Self::User(id) => format!("cart:user:{id}"),
        }
    }

    /// The identity owning this scope, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&IdentityId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }
}

impl fmt::Display for CartScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Errors that can occur when decoding a [`CartRecord`].
#[derive(Debug, Error)]
pub enum CartRecordError {
    /// The stored JSON is malformed.
    #[error("malformed cart record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The record was written by a newer schema.
    #[error("unsupported cart record version {found} (max {CART_RECORD_VERSION})")]
    UnsupportedVersion {
        /// Version found in storage.
        found: u32,
    },
}

/// Persisted form of one cart scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartRecord {
    /// Schema version the record was written with.
    pub version: u32,
    /// Lines in insertion order.
    pub items: Vec<CartItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Versioned { version: u32, items: Vec<CartItem> },
    // Unversioned records were written as a bare item array
    Legacy(Vec<CartItem>),
}

impl CartRecord {
    /// Wrap items in a record at the current schema version.
    #[must_use]
    pub const fn new(items: Vec<CartItem>) -> Self {
        Self {
            version: CART_RECORD_VERSION,
            items,
        }
    }

    /// Decode a stored record.
    ///
    /// Accepts both the versioned object and the legacy bare array.
    ///
    /// # Errors
    ///
    /// Returns `CartRecordError::Malformed` if the JSON does not match either
    /// shape, or `CartRecordError::UnsupportedVersion` for a future version.
    pub fn from_json(raw: &str) -> Result<Self, CartRecordError> {
        match serde_json::from_str::<StoredRecord>(raw)? {
            StoredRecord::Versioned { version, items } => {
                if version > CART_RECORD_VERSION {
                    return Err(CartRecordError::UnsupportedVersion { found: version });
                }
                Ok(Self::new(items))
            }
            StoredRecord::Legacy(items) => Ok(Self::new(items)),
        }
    }

    /// Encode the record at the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Self::new(self.items.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_item() -> CatalogItem {
        CatalogItem {
            kind: CartItemKind::Product,
            id: CatalogId::new(7),
            name: "Canvas Tote".to_string(),
            price: Decimal::new(1999, 2),
            image: Some("/img/tee.png".to_string()),
        }
    }

    #[test]
    fn test_key_derivation() {
        let id = CatalogId::new(1);
        assert_eq!(
            CartKey::derive(CartItemKind::Product, id, None).as_str(),
            "product-1"
        );
        assert_eq!(
            CartKey::derive(CartItemKind::Pack, id, Some("Navy  Blue")).as_str(),
            "pack-1-navy_blue"
        );
        assert_eq!(
            CartKey::derive(CartItemKind::Product, id, Some("  ")).as_str(),
            "product-1"
        );
    }

    #[test]
    fn test_from_catalog_freezes_price_and_floors_quantity() {
        let mut catalog = sample_item();
        let item = CartItem::from_catalog(&catalog, 0, Some("Red"), Utc::now());
        catalog.price = Decimal::new(2999, 2);

        assert_eq!(item.quantity, 1);
        assert_eq!(item.price, Decimal::new(1999, 2));
        assert_eq!(item.key.as_str(), "product-7-red");
        assert_eq!(item.variant.as_deref(), Some("Red"));
    }

    #[test]
    fn test_line_total() {
        let item = CartItem::from_catalog(&sample_item(), 3, None, Utc::now());
        assert_eq!(item.line_total(), Decimal::new(5997, 2));
    }

    #[test]
    fn test_scope_storage_keys() {
        assert_eq!(CartScope::Guest.storage_key(), "cart:guest");
        assert_eq!(
            CartScope::User(IdentityId::new("42")).storage_key(),
            "cart:user:42"
        );
    }

    #[test]
    fn test_record_reads_legacy_array() {
        let item = CartItem::from_catalog(&sample_item(), 2, None, Utc::now());
        let legacy = serde_json::to_string(&vec![item.clone()]).unwrap();

        let record = CartRecord::from_json(&legacy).unwrap();
        assert_eq!(record.version, CART_RECORD_VERSION);
        assert_eq!(record.items, vec![item]);
    }

    #[test]
    fn test_record_writes_version() {
        let record = CartRecord::new(Vec::new());
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert!(json["items"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_record_rejects_future_version() {
        let raw = r#"{"version": 99, "items": []}"#;
        assert!(matches!(
            CartRecord::from_json(raw),
            Err(CartRecordError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn test_record_rejects_garbage() {
        assert!(matches!(
            CartRecord::from_json("{not json"),
            Err(CartRecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Pack".parse::<CartItemKind>().unwrap(), CartItemKind::Pack);
        assert!("widget".parse::<CartItemKind>().is_err());
    }
}
