//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate holds every rule of the ledger and catalog engine that can be
//! expressed without touching a store: money math, the role hierarchy, the
//! debtor posting state machine, price adjustment, delimited-text parsing
//! and the cart.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       Web UI (external)                         │   │
//! │  │    Catalog ──► Cart ──► Ledger ──► Admin tools                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-engine (Session, Ledger, ...)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  types  │ │  money  │ │ access  │ │ ledger  │ │ pricing │  │   │
//! │  │   │ Debtor  │ │  Money  │ │  Role   │ │ apply() │ │ adjust  │  │   │
//! │  │   │ Item    │ │         │ │ guard   │ │         │ │         │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌────────────┐                       │   │
//! │  │   │ import  │ │  cart   │ │ validation │                       │   │
//! │  │   └─────────┘ └─────────┘ └────────────┘                       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORE • NO NETWORK • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-store (Document Store Adapter)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Debtor, CatalogItem, StoreConfig, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`access`] - Roles, staff entries and the access guard
//! - [`ledger`] - Pure debtor posting math
//! - [`pricing`] - Percentage price adjustment
//! - [`import`] - Delimited-text catalog import parser
//! - [`cart`] - Client-side cart
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::pricing::{adjust_price, Percentage, PriceDirection};
//!
//! let price = Money::from_major(999);
//! let pct: Percentage = "10".parse().unwrap();
//!
//! assert_eq!(adjust_price(price, PriceDirection::Increase, pct).unwrap(), Money::from_major(1099));
//! assert_eq!(adjust_price(price, PriceDirection::Decrease, pct).unwrap(), Money::from_major(899));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod cart;
pub mod error;
pub mod import;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{authorize, resolve_identity, Operation, Role, StaffEntry, StaffIdentity};
pub use cart::{Cart, CartLine, CartTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use validation::ValidationResult;
pub use ledger::{debtor_id_for_key, total_outstanding, PostingEffect};
pub use money::Money;
pub use pricing::{adjust_price, Percentage, PriceDirection};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Hard ceiling on operations in one atomic batch commit.
///
/// Mirrors the backing store's limit. Commits above it are rejected whole.
pub const MAX_BATCH_WRITES: usize = 500;

/// Default batch budget used by bulk operations.
///
/// Leaves headroom under [`MAX_BATCH_WRITES`].
pub const DEFAULT_BATCH_BUDGET: usize = 450;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in the cart.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Number of trashed items returned by one trash listing.
pub const TRASH_LISTING_LIMIT: usize = 50;

/// Category assigned when none is given.
pub const DEFAULT_CATEGORY: &str = "General";

/// Document id of the per-store configuration inside the `items` collection.
pub const CONFIG_DOCUMENT_ID: &str = "_config";

/// Display name used in history entries for the super admin.
pub const SUPER_ADMIN_DISPLAY_NAME: &str = "Super Admin";
