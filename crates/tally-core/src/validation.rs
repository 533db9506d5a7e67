//! # Validation Module
//!
//! Input validation for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web UI                                                       │
//! │  └── Immediate feedback (empty fields, obvious typos)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine operation (Rust)                                      │
//! │  ├── Access guard (role × operation)                                   │
//! │  └── THIS MODULE: amounts, names, emails, prices                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Document store                                               │
//! │  └── Preconditions (exists / version) on every write                   │
//! │                                                                         │
//! │  Nothing in layer 2 ever reaches the store when it fails               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::validation::{validate_amount, validate_debtor_name};
//!
//! assert!(validate_amount(Money::from_major(500)).is_ok());
//! assert_eq!(validate_debtor_name("  Amina ").unwrap(), "Amina");
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum length of a self-chosen staff display name.
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum length of a store name typed at sign-in.
pub const MIN_STORE_NAME_LEN: usize = 2;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a debtor name and returns it trimmed.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 100 characters
pub fn validate_debtor_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("debtor name"));
    }

    if name.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "debtor name".to_string(),
            max: 100,
        });
    }

    Ok(name.to_string())
}

/// Validates a catalog item name.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_item_name;
///
/// assert!(validate_item_name("Rice 5kg").is_ok());
/// assert!(validate_item_name("   ").is_err());
/// ```
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a staff display name.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  First sign-in without a stored name                                   │
/// │                                                                         │
/// │  Prompt: "Enter Your Name"                                             │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_username("Jo") ← THIS FUNCTION                               │
/// │       │                                                                 │
/// │       ├── < 3 chars? → "Name too short"                                │
/// │       │                                                                 │
/// │       └── OK → written to the staff map                                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_username(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.chars().count() < MIN_USERNAME_LEN {
        return Err(ValidationError::TooShort {
            field: "Name".to_string(),
            min: MIN_USERNAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates the store name typed at sign-in and returns it trimmed.
pub fn validate_store_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.chars().count() < MIN_STORE_NAME_LEN {
        return Err(ValidationError::TooShort {
            field: "store name".to_string(),
            min: MIN_STORE_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates a staff email and returns it lowercased.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_email;
///
/// assert_eq!(validate_email(" Bala@Shop.NG ").unwrap(), "bala@shop.ng");
/// assert!(validate_email("bala").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }

    if !email.contains('@') {
        return Err(ValidationError::invalid_format("email", "must contain @"));
    }

    Ok(email)
}

/// Validates a category name and returns it trimmed.
pub fn validate_category(category: &str) -> ValidationResult<String> {
    let category = category.trim();

    if category.is_empty() {
        return Err(ValidationError::required("category"));
    }

    Ok(category.to_string())
}

/// Trims a search term. Empty is allowed and matches everything.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a ledger posting amount.
///
/// ## Rules
/// - Must be strictly positive; the sign comes from the posting kind
pub fn validate_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a catalog price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a cart line quantity.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates that one more line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_debtor_name() {
        assert_eq!(validate_debtor_name(" Amina ").unwrap(), "Amina");
        assert!(validate_debtor_name("").is_err());
        assert!(validate_debtor_name("   ").is_err());
        assert!(validate_debtor_name(&"A".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username(" Bala ").unwrap(), "Bala");
        let err = validate_username("Jo").unwrap_err();
        assert_eq!(err.to_string(), "Name must be at least 3 characters");
    }

    #[test]
    fn test_validate_store_name() {
        assert!(validate_store_name("AB").is_ok());
        assert!(validate_store_name(" A ").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("Owner@Shop.ng").unwrap(), "owner@shop.ng");
        assert!(validate_email("").is_err());
        assert!(validate_email("owner.shop.ng").is_err());
    }

    #[test]
    fn test_validate_amount_and_price() {
        assert!(validate_amount(Money::from_cents(1)).is_ok());
        assert!(validate_amount(Money::zero()).is_err());
        assert!(validate_amount(Money::from_cents(-5)).is_err());

        assert!(validate_price(Money::zero()).is_ok());
        assert!(validate_price(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(99).is_ok());
        assert!(validate_cart_size(100).is_err());
    }
}
