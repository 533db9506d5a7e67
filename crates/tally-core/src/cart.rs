//! # Cart Module
//!
//! The client-side cart. Lives only in memory; checkout turns it into a
//! single audit entry.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  UI Action                Method                  State Change          │
//! │  ─────────                ──────                  ────────────          │
//! │                                                                         │
//! │  Tap item ──────────────► add_item() ───────────► push or qty += n     │
//! │                                                                         │
//! │  [+] / [−] ─────────────► change_quantity() ────► qty += delta         │
//! │                                                  (qty < 1 removes)     │
//! │                                                                         │
//! │  Remove ────────────────► remove_item() ────────► lines.retain(..)     │
//! │                                                                         │
//! │  Checkout / Clear ──────► clear() ──────────────► lines.clear()        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::CatalogItem;
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
///
/// Name and unit price are frozen when the item is added, so a price change
/// arriving from the replica does not alter what the customer was quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub item_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl CartLine {
    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `item_id`
/// - Every quantity is in `1..=999`
/// - At most 100 lines
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds an item, or increases the quantity when it is already present.
    pub fn add_item(&mut self, item: &CatalogItem, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == item.id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        self.lines.push(CartLine {
            item_id: item.id.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity,
        });
        Ok(())
    }

    /// Moves a line's quantity by `delta`. Dropping below 1 removes the line.
    pub fn change_quantity(&mut self, item_id: &str, delta: i64) -> CoreResult<()> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.item_id == item_id)
            .ok_or_else(|| CoreError::ItemNotInCart(item_id.to_string()))?;

        let new_qty = self.lines[idx].quantity + delta;
        if new_qty < 1 {
            self.lines.remove(idx);
            return Ok(());
        }
        if new_qty > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: new_qty,
                max: MAX_ITEM_QUANTITY,
            });
        }

        self.lines[idx].quantity = new_qty;
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.item_id != item_id);

        if self.lines.len() == before {
            Err(CoreError::ItemNotInCart(item_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of quantities across lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Cart summary for the UI footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub total: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.line_count(),
            total_quantity: cart.total_quantity(),
            total: cart.total(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemDraft;
    use chrono::Utc;

    fn item(id: &str, price_major: i64) -> CatalogItem {
        CatalogItem::from_draft(
            id,
            ItemDraft {
                name: format!("Item {}", id),
                price: Money::from_major(price_major),
                ..ItemDraft::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_add_item_and_totals() {
        let mut cart = Cart::new();
        cart.add_item(&item("1", 999), 2).unwrap();
        cart.add_item(&item("2", 100), 1).unwrap();

        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.total(), Money::from_major(2098));
    }

    #[test]
    fn test_add_same_item_increases_quantity() {
        let mut cart = Cart::new();
        let rice = item("1", 999);
        cart.add_item(&rice, 2).unwrap();
        cart.add_item(&rice, 3).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_price_frozen_at_add() {
        let mut cart = Cart::new();
        let mut rice = item("1", 999);
        cart.add_item(&rice, 1).unwrap();

        rice.price = Money::from_major(1200);
        cart.add_item(&rice, 1).unwrap();
        assert_eq!(cart.total(), Money::from_major(1998));
    }

    #[test]
    fn test_change_quantity_removes_below_one() {
        let mut cart = Cart::new();
        cart.add_item(&item("1", 50), 1).unwrap();

        cart.change_quantity("1", 2).unwrap();
        assert_eq!(cart.total_quantity(), 3);

        cart.change_quantity("1", -3).unwrap();
        assert!(cart.is_empty());

        assert!(matches!(
            cart.change_quantity("1", 1),
            Err(CoreError::ItemNotInCart(_))
        ));
    }

    #[test]
    fn test_quantity_cap() {
        let mut cart = Cart::new();
        cart.add_item(&item("1", 1), 999).unwrap();
        assert!(matches!(
            cart.add_item(&item("1", 1), 1),
            Err(CoreError::QuantityTooLarge { .. })
        ));
        assert!(cart.change_quantity("1", 1).is_err());
    }

    #[test]
    fn test_line_cap() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(&item(&i.to_string(), 1), 1).unwrap();
        }
        assert!(matches!(
            cart.add_item(&item("overflow", 1), 1),
            Err(CoreError::CartTooLarge { .. })
        ));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add_item(&item("1", 10), 1).unwrap();
        cart.add_item(&item("2", 10), 1).unwrap();

        cart.remove_item("1").unwrap();
        assert!(cart.remove_item("1").is_err());
        assert_eq!(CartTotals::from(&cart).line_count, 1);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Money::zero());
    }
}
