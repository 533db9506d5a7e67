//! # Documents and Paths
//!
//! Addressing and the stored document shape.
//!
//! ## Addressing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CollectionPath                              Document id                │
//! │  ─────────────────────────────────────       ─────────────             │
//! │  pk_store_mamaput / items                    3f2a…  (UUID v4)           │
//! │  pk_store_mamaput / items                    _config                    │
//! │  pk_store_mamaput / debtors                  d_amina                    │
//! │  pk_store_mamaput / logs                     91bc…  (UUID v4)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tally_core::StoreNamespace;

use crate::error::StoreResult;

// =============================================================================
// Collections
// =============================================================================

/// The collections every store namespace owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Catalog items plus the `_config` document.
    Items,
    Debtors,
    /// Append-only audit log.
    Logs,
}

impl Collection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Collection::Items => "items",
            Collection::Debtors => "debtors",
            Collection::Logs => "logs",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collection inside one store namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    pub namespace: StoreNamespace,
    pub collection: Collection,
}

impl CollectionPath {
    pub fn new(namespace: StoreNamespace, collection: Collection) -> Self {
        CollectionPath {
            namespace,
            collection,
        }
    }

    pub fn items(namespace: &StoreNamespace) -> Self {
        CollectionPath::new(namespace.clone(), Collection::Items)
    }

    pub fn debtors(namespace: &StoreNamespace) -> Self {
        CollectionPath::new(namespace.clone(), Collection::Debtors)
    }

    pub fn logs(namespace: &StoreNamespace) -> Self {
        CollectionPath::new(namespace.clone(), Collection::Logs)
    }

    /// Flat key used by the SQLite backend and in error messages.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.collection)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.collection)
    }
}

// =============================================================================
// Field Paths
// =============================================================================

/// A path into a document made of literal segments.
///
/// Segments are never split on `.`, so `staff["bala@shop.ng"]` is addressed
/// as `["staff", "bala@shop.ng"]`, not as four nested keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath(segments.into_iter().map(Into::into).collect())
    }

    /// A top-level field.
    pub fn field(name: impl Into<String>) -> Self {
        FieldPath(vec![name.into()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

// =============================================================================
// Document
// =============================================================================

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Starts at 1, bumped by every write. Used as the compare-and-swap token.
    pub version: u64,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Deserializes the body with `id` injected from the document id.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(self.id.clone()));
        }
        Ok(serde_json::from_value(data)?)
    }

    /// Top-level field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}
