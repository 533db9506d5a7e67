//! # Cart State & Checkout
//!
//! Holds the current cart and turns it into a sale.
//!
//! ## Thread Safety
//! The cart is wrapped in `Arc<Mutex<T>>`: several UI events may touch it,
//! and only one may modify it at a time.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout(session)                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock cart ── empty? ──► EmptyCart (CART_ERROR)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  take the lines, leave an empty cart                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  audit "Sale": "Sold {lines} items. Total: ₦{total}"                    │
//! │       │         meta {items: [{id, name, qty, price}], total}           │
//! │       ▼                                                                 │
//! │  SaleReceipt  (stock is not decremented)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tally_core::{AuditAction, Cart, CartLine, CartTotals, CatalogItem, CoreError, Money, Operation};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::session::Session;

// =============================================================================
// Cart State
// =============================================================================

/// Shared handle to the current cart.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
}

impl CartState {
    /// Creates a new empty cart state.
    pub fn new() -> Self {
        CartState::default()
    }

    /// Executes a function with read access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let totals = cart_state.with_cart(|cart| CartTotals::from(cart));
    /// ```
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.cart.lock().unwrap_or_else(|e| e.into_inner());
        f(&cart)
    }

    /// Executes a function with write access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// cart_state.with_cart_mut(|cart| cart.add_item(&item, 1))?;
    /// ```
    pub fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.cart.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut cart)
    }

    pub fn totals(&self) -> CartTotals {
        self.with_cart(|cart| CartTotals::from(cart))
    }
}

// =============================================================================
// Sale Receipt
// =============================================================================

/// What the customer bought, returned once the sale is logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleReceipt {
    pub id: String,
    pub lines: Vec<CartLine>,
    pub total: Money,
    pub total_quantity: i64,
    pub staff: String,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Clone)]
pub struct Checkout {
    cart: CartState,
    audit: AuditLog,
    currency_symbol: String,
}

impl Checkout {
    pub fn new(cart: CartState, audit: AuditLog, config: &EngineConfig) -> Self {
        Checkout {
            cart,
            audit,
            currency_symbol: config.currency_symbol.clone(),
        }
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    /// Adds `quantity` of `item`, freezing its current name and price.
    pub fn add_item(&self, session: &Session, item: &CatalogItem, quantity: i64) -> EngineResult<CartTotals> {
        session.authorize(Operation::AddToCart)?;
        self.cart.with_cart_mut(|cart| cart.add_item(item, quantity))?;
        Ok(self.cart.totals())
    }

    pub fn change_quantity(&self, item_id: &str, delta: i64) -> EngineResult<CartTotals> {
        self.cart.with_cart_mut(|cart| cart.change_quantity(item_id, delta))?;
        Ok(self.cart.totals())
    }

    pub fn remove_item(&self, item_id: &str) -> EngineResult<CartTotals> {
        self.cart.with_cart_mut(|cart| cart.remove_item(item_id))?;
        Ok(self.cart.totals())
    }

    pub fn clear(&self) {
        self.cart.with_cart_mut(Cart::clear);
    }

    /// Completes the sale: one audit entry, then an empty cart.
    pub async fn checkout(&self, session: &Session) -> EngineResult<SaleReceipt> {
        session.authorize(Operation::Checkout)?;

        let lines = self.cart.with_cart_mut(|cart| {
            if cart.is_empty() {
                return Err(CoreError::EmptyCart);
            }
            Ok(std::mem::take(&mut cart.lines))
        })?;

        let sold = Cart { lines };
        let receipt = SaleReceipt {
            id: Uuid::new_v4().to_string(),
            total: sold.total(),
            total_quantity: sold.total_quantity(),
            staff: session.actor_name().to_string(),
            sold_at: Utc::now(),
            lines: sold.lines,
        };

        let items: Vec<_> = receipt
            .lines
            .iter()
            .map(|l| json!({ "id": l.item_id, "name": l.name, "qty": l.quantity, "price": l.unit_price }))
            .collect();

        info!(
            store = %session.namespace,
            lines = receipt.lines.len(),
            total = %receipt.total,
            "Sale completed"
        );
        self.audit
            .record(
                session,
                AuditAction::Sale,
                format!(
                    "Sold {} items. Total: {}",
                    receipt.lines.len(),
                    receipt.total.format_with_symbol(&self.currency_symbol)
                ),
                json!({ "items": items, "total": receipt.total }),
            )
            .await;

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::session_with_role;
    use tally_core::{ItemDraft, Role};
    use tally_store::MemoryStore;

    fn item(id: &str, price: i64) -> CatalogItem {
        let draft = ItemDraft {
            name: format!("Item {}", id),
            price: Money::from_major(price),
            ..Default::default()
        };
        CatalogItem::from_draft(id, draft, Utc::now())
    }

    fn checkout() -> Checkout {
        let store = Arc::new(MemoryStore::new());
        Checkout::new(
            CartState::new(),
            AuditLog::new(store),
            &EngineConfig::in_memory("owner@shop.ng"),
        )
    }

    #[tokio::test]
    async fn test_checkout_logs_sale_and_clears_cart() {
        let checkout = checkout();
        let staff = session_with_role(Role::Staff);

        checkout.add_item(&staff, &item("a", 350), 2).unwrap();
        let totals = checkout.add_item(&staff, &item("b", 1_000), 1).unwrap();
        assert_eq!(totals.line_count, 2);
        assert_eq!(totals.total, Money::from_major(1_700));

        let receipt = checkout.checkout(&staff).await.unwrap();
        assert_eq!(receipt.lines.len(), 2);
        assert_eq!(receipt.total, Money::from_major(1_700));
        assert_eq!(receipt.total_quantity, 3);
        assert_eq!(receipt.staff, staff.actor_name());
        assert!(checkout.cart().with_cart(Cart::is_empty));

        let admin = session_with_role(Role::Admin);
        let entries = checkout.audit.recent(&admin, 5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Sale);
        assert_eq!(entries[0].details, "Sold 2 items. Total: ₦1,700.00");
        assert_eq!(entries[0].meta["items"][0]["qty"], 2);
        assert_eq!(entries[0].meta["total"], 170_000);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let err = checkout()
            .checkout(&session_with_role(Role::Staff))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CartError);
    }

    #[test]
    fn test_quantity_changes_through_state() {
        let checkout = checkout();
        let staff = session_with_role(Role::Staff);
        checkout.add_item(&staff, &item("a", 100), 1).unwrap();

        let totals = checkout.change_quantity("a", 4).unwrap();
        assert_eq!(totals.total_quantity, 5);

        let totals = checkout.change_quantity("a", -5).unwrap();
        assert_eq!(totals.line_count, 0);

        let err = checkout.remove_item("a").unwrap_err();
        assert_eq!(err.code, ErrorCode::CartError);

        let err = checkout.add_item(&staff, &item("b", 100), 1_000).unwrap_err();
        assert_eq!(err.code, ErrorCode::CartError);
    }

    #[test]
    fn test_cart_state_clones_share_cart() {
        let state = CartState::new();
        let other = state.clone();
        state
            .with_cart_mut(|cart| cart.add_item(&item("a", 100), 1))
            .unwrap();
        assert_eq!(other.totals().line_count, 1);
    }
}
