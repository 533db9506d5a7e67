//! # Domain Types
//!
//! Core domain types used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Debtor      │   │  HistoryEntry   │   │  CatalogItem    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  type           │   │  id (UUID)      │       │
//! │  │  name / nameKey │   │  amount         │   │  name, price    │       │
//! │  │  currentBalance │   │  desc, date     │   │  costPrice      │       │
//! │  │  history[]      │   │  staff          │   │  isDeleted      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StoreConfig    │   │ AuditLogEntry   │   │ StoreNamespace  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  staff map      │   │  action         │   │  pk_store_<x>   │       │
//! │  │  categories     │   │  details, user  │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names serialize in camelCase, which is the layout of the stored
//! documents. Timestamps used for ordering (`createdAt`, `lastUpdated`,
//! `updatedAt`, `timestamp`) are stored as epoch milliseconds so that both
//! store backends order them numerically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::access::StaffEntry;
use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{validate_item_name, validate_price, ValidationResult};
use crate::DEFAULT_CATEGORY;

// =============================================================================
// Store Namespace
// =============================================================================

/// Prefix of every per-store namespace.
pub const STORE_NAMESPACE_PREFIX: &str = "pk_store_";

/// Namespace key addressing one store's collections.
///
/// ## Sanitization
/// ```text
/// "Mama Put & Sons"  ──►  strip non-alphanumerics  ──►  "MamaPutSons"
///                    ──►  lowercase                ──►  "mamaputsons"
///                    ──►  prefix                   ──►  "pk_store_mamaputsons"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreNamespace(String);

impl StoreNamespace {
    /// Derives the namespace from a user-typed store name.
    pub fn from_store_name(store_name: &str) -> ValidationResult<Self> {
        let safe: String = store_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if safe.is_empty() {
            return Err(ValidationError::invalid_format(
                "store name",
                "must contain at least one letter or digit",
            ));
        }

        Ok(StoreNamespace(format!("{}{}", STORE_NAMESPACE_PREFIX, safe)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Ledger Types
// =============================================================================

/// Kind of a ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum EntryType {
    Debt,
    Payment,
}

impl EntryType {
    /// +1 for debt, -1 for payment.
    pub const fn sign(&self) -> i64 {
        match self {
            EntryType::Debt => 1,
            EntryType::Payment => -1,
        }
    }

    /// Description used when the caller leaves it blank.
    pub const fn default_description(&self) -> &'static str {
        match self {
            EntryType::Debt => "Items",
            EntryType::Payment => "Payment",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Debt => f.write_str("debt"),
            EntryType::Payment => f.write_str("payment"),
        }
    }
}

/// One immutable posting in a debtor's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: EntryType,

    /// Always positive; the sign comes from `kind`.
    pub amount: Money,

    /// Free text; older records call this field `items`.
    #[serde(default, alias = "items")]
    pub desc: String,

    /// Client-observed time, for display only.
    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    /// Display name of the staff member who posted it.
    #[serde(default)]
    pub staff: String,
}

impl HistoryEntry {
    /// Builds an entry, falling back to the default description when blank.
    pub fn new(
        kind: EntryType,
        amount: Money,
        description: Option<&str>,
        date: DateTime<Utc>,
        staff: impl Into<String>,
    ) -> Self {
        let desc = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(kind.default_description())
            .to_string();

        HistoryEntry {
            kind,
            amount,
            desc,
            date,
            staff: staff.into(),
        }
    }

    /// Signed contribution to the balance.
    pub fn signed_amount(&self) -> Money {
        self.amount * self.kind.sign()
    }
}

/// A named customer with an outstanding balance.
///
/// ## Lifecycle
/// ```text
/// absent ──first debt──► active (balance > 0) ──posting──► active
///                              │
///                              └──payment to ≤ 0 / settle──► deleted
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Debtor {
    /// Store-assigned id; injected from the document id on read.
    #[serde(default)]
    pub id: String,

    pub name: String,

    /// Case-folded name used for duplicate resolution.
    #[serde(default)]
    pub name_key: String,

    pub current_balance: Money,

    /// Newest first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub last_updated: DateTime<Utc>,
}

/// Normalizes a debtor name for matching: trimmed, single-spaced, lowercase.
///
/// ## Example
/// ```rust
/// use tally_core::types::debtor_name_key;
///
/// assert_eq!(debtor_name_key("  Amina   Bello "), "amina bello");
/// ```
pub fn debtor_name_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// =============================================================================
// Catalog Types
// =============================================================================

/// An item in the store's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CatalogItem {
    #[serde(default)]
    pub id: String,

    pub name: String,

    pub price: Money,

    /// Only readable by admin-tier roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<Money>,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub barcode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_price: Option<Money>,

    /// Soft-delete flag. Listings always filter on `false`.
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Builds a fresh, non-deleted item from a validated draft.
    pub fn from_draft(id: impl Into<String>, draft: ItemDraft, now: DateTime<Utc>) -> Self {
        CatalogItem {
            id: id.into(),
            name: draft.name.trim().to_string(),
            price: draft.price,
            cost_price: draft.cost_price,
            category: draft.category_or_default(),
            barcode: draft.barcode.trim().to_string(),
            bulk_price: draft.bulk_price,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy with the cost price removed unless `can_view_cost` is set.
    pub fn redacted(mut self, can_view_cost: bool) -> Self {
        if !can_view_cost {
            self.cost_price = None;
        }
        self
    }

    /// Catalog list filter: term against "name category", then category.
    ///
    /// A `category` of `None` or `"All"` matches every item.
    pub fn matches_search(&self, term: &str, category: Option<&str>) -> bool {
        let term = term.trim().to_lowercase();
        let haystack = format!("{} {}", self.name, self.category).to_lowercase();
        let category_ok = match category {
            None => true,
            Some(c) if c.eq_ignore_ascii_case("all") => true,
            Some(c) => self.category.trim() == c.trim(),
        };
        haystack.contains(&term) && category_ok
    }
}

/// Fields of the single-item create/edit form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub barcode: String,
    #[serde(default)]
    pub cost_price: Option<Money>,
    #[serde(default)]
    pub bulk_price: Option<Money>,
}

impl ItemDraft {
    /// Checks name and prices.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_item_name(&self.name)?;
        validate_price(self.price)?;
        if let Some(cost) = self.cost_price {
            validate_price(cost)?;
        }
        if let Some(bulk) = self.bulk_price {
            validate_price(bulk)?;
        }
        Ok(())
    }

    /// Category with the default applied to blank input.
    pub fn category_or_default(&self) -> String {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string()
    }
}

/// Catalog summary shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub active_count: usize,
    /// `(label, count)` for the price bands `0-500`, `500-1k`, `1k-5k`, `5k+`.
    pub price_bands: Vec<(String, usize)>,
}

impl CatalogStats {
    /// Buckets item prices in whole currency units.
    pub fn from_items(items: &[CatalogItem]) -> Self {
        let mut counts = [0usize; 4];
        for item in items {
            let major = item.price.major();
            let band = match major {
                m if m < 500 => 0,
                m if m < 1_000 => 1,
                m if m < 5_000 => 2,
                _ => 3,
            };
            counts[band] += 1;
        }

        let labels = ["0-500", "500-1k", "1k-5k", "5k+"];
        CatalogStats {
            active_count: items.len(),
            price_bands: labels
                .iter()
                .zip(counts)
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// The per-store `_config` document: staff map and category list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StoreConfig {
    /// Lowercase email → entry.
    #[serde(default)]
    pub staff: BTreeMap<String, StaffEntry>,

    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

fn default_categories() -> Vec<String> {
    vec![DEFAULT_CATEGORY.to_string()]
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            staff: BTreeMap::new(),
            categories: default_categories(),
        }
    }
}

impl StoreConfig {
    /// True when `category` is already listed (case-insensitive).
    pub fn has_category(&self, category: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(category.trim()))
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// Every kind of mutating action that lands in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AuditAction {
    #[serde(rename = "Sale")]
    Sale,
    #[serde(rename = "Soft Delete")]
    SoftDelete,
    #[serde(rename = "Restore")]
    Restore,
    #[serde(rename = "Bulk Update")]
    BulkUpdate,
    #[serde(rename = "Bulk Import")]
    BulkImport,
    #[serde(rename = "Debt Added")]
    DebtAdded,
    #[serde(rename = "Payment Received")]
    PaymentReceived,
    #[serde(rename = "Debt Settled")]
    DebtSettled,
    #[serde(rename = "Item Created")]
    ItemCreated,
    #[serde(rename = "Item Updated")]
    ItemUpdated,
    #[serde(rename = "Staff Added")]
    StaffAdded,
    #[serde(rename = "Staff Removed")]
    StaffRemoved,
    #[serde(rename = "Username Set")]
    UsernameSet,
    #[serde(rename = "Category Added")]
    CategoryAdded,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AuditAction::Sale => "Sale",
            AuditAction::SoftDelete => "Soft Delete",
            AuditAction::Restore => "Restore",
            AuditAction::BulkUpdate => "Bulk Update",
            AuditAction::BulkImport => "Bulk Import",
            AuditAction::DebtAdded => "Debt Added",
            AuditAction::PaymentReceived => "Payment Received",
            AuditAction::DebtSettled => "Debt Settled",
            AuditAction::ItemCreated => "Item Created",
            AuditAction::ItemUpdated => "Item Updated",
            AuditAction::StaffAdded => "Staff Added",
            AuditAction::StaffRemoved => "Staff Removed",
            AuditAction::UsernameSet => "Username Set",
            AuditAction::CategoryAdded => "Category Added",
        };
        f.write_str(text)
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuditLogEntry {
    #[serde(default)]
    pub id: String,

    pub action: AuditAction,

    pub details: String,

    /// Email of the acting user.
    pub user: String,

    #[serde(default)]
    pub store_name: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub meta: serde_json::Value,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn item(name: &str, category: &str, price_major: i64) -> CatalogItem {
        CatalogItem::from_draft(
            name.to_lowercase(),
            ItemDraft {
                name: name.to_string(),
                price: Money::from_major(price_major),
                category: Some(category.to_string()),
                barcode: String::new(),
                cost_price: Some(Money::from_major(price_major / 2)),
                bulk_price: None,
            },
            at(1_700_000_000),
        )
    }

    #[test]
    fn test_store_namespace_sanitization() {
        let ns = StoreNamespace::from_store_name("Mama Put & Sons").unwrap();
        assert_eq!(ns.as_str(), "pk_store_mamaputsons");

        let ns = StoreNamespace::from_store_name("SHOP-42").unwrap();
        assert_eq!(ns.as_str(), "pk_store_shop42");

        assert!(StoreNamespace::from_store_name("  & ").is_err());
    }

    #[test]
    fn test_history_entry_defaults_and_sign() {
        let entry = HistoryEntry::new(EntryType::Debt, Money::from_major(500), Some("  "), at(0), "Amina");
        assert_eq!(entry.desc, "Items");
        assert_eq!(entry.signed_amount(), Money::from_major(500));

        let entry = HistoryEntry::new(EntryType::Payment, Money::from_major(200), None, at(0), "Amina");
        assert_eq!(entry.desc, "Payment");
        assert_eq!(entry.signed_amount(), Money::from_major(-200));
    }

    #[test]
    fn test_history_entry_reads_legacy_items_field() {
        let json = r#"{"type":"debt","amount":50000,"items":"rice","date":"2024-01-01T00:00:00Z","staff":"Bala"}"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.desc, "rice");
        assert_eq!(entry.kind, EntryType::Debt);
    }

    #[test]
    fn test_debtor_document_layout() {
        let debtor = Debtor {
            id: "amina".into(),
            name: "Amina".into(),
            name_key: "amina".into(),
            current_balance: Money::from_major(500),
            history: vec![],
            created_at: at(1_700_000_000),
            last_updated: at(1_700_000_100),
        };
        let value = serde_json::to_value(&debtor).unwrap();
        assert_eq!(value["currentBalance"], 50000);
        assert_eq!(value["nameKey"], "amina");
        assert_eq!(value["lastUpdated"], 1_700_000_100_000i64);
    }

    #[test]
    fn test_catalog_item_redaction_and_search() {
        let rice = item("Rice 5kg", "Grains", 4500);
        assert!(rice.cost_price.is_some());
        assert!(rice.clone().redacted(true).cost_price.is_some());
        assert!(rice.clone().redacted(false).cost_price.is_none());

        assert!(rice.matches_search("rice", None));
        assert!(rice.matches_search("GRAIN", Some("All")));
        assert!(rice.matches_search("", Some("Grains")));
        assert!(!rice.matches_search("", Some("Drinks")));
        assert!(!rice.matches_search("beans", None));
    }

    #[test]
    fn test_item_draft_category_default() {
        let draft = ItemDraft {
            name: "Sugar".into(),
            price: Money::from_major(900),
            ..ItemDraft::default()
        };
        assert!(draft.validate().is_ok());
        assert_eq!(draft.category_or_default(), "General");

        let bad = ItemDraft {
            price: Money::from_major(-1),
            ..draft
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_catalog_stats_bands() {
        let items = vec![
            item("Gum", "Snacks", 100),
            item("Bread", "Bakery", 800),
            item("Oil", "Grocery", 2500),
            item("Rice", "Grains", 45000),
            item("Salt", "Grocery", 499),
        ];
        let stats = CatalogStats::from_items(&items);
        assert_eq!(stats.active_count, 5);
        assert_eq!(
            stats.price_bands,
            vec![
                ("0-500".to_string(), 2),
                ("500-1k".to_string(), 1),
                ("1k-5k".to_string(), 1),
                ("5k+".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_store_config_defaults() {
        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.categories, vec!["General".to_string()]);
        assert!(config.staff.is_empty());
        assert!(config.has_category("general"));
    }

    #[test]
    fn test_audit_action_serializes_as_label() {
        let json = serde_json::to_string(&AuditAction::SoftDelete).unwrap();
        assert_eq!(json, r#""Soft Delete""#);
        assert_eq!(AuditAction::BulkUpdate.to_string(), "Bulk Update");
    }
}
