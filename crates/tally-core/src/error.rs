//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations, access denials       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-store errors (separate crate)                                   │
//! │  └── StoreError       - Backing store failures, precondition misses    │
//! │                                                                         │
//! │  tally-engine errors                                                   │
//! │  └── EngineError      - What the UI sees (code + one-line message)     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                          StoreError ┴→ EngineError → UI toast          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation and permission errors are raised before any store call is
//! made, so they never leave partial state behind.

use thiserror::Error;

use crate::access::{Operation, Role};
use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The caller's role does not allow the operation.
    ///
    /// ## When This Occurs
    /// - A staff member tries to post to the ledger
    /// - A manager asks for cost prices
    ///
    /// Resolved locally; the store is never contacted.
    #[error("{role} cannot {operation}")]
    PermissionDenied { operation: Operation, role: Role },

    /// The email has no entry in the store's staff map.
    #[error("Access denied for {email}")]
    AccessDenied { email: String },

    /// A repayment larger than the outstanding balance.
    ///
    /// ## User Workflow
    /// ```text
    /// Debtor "Amina" owes ₦500.00
    ///      │
    ///      ▼
    /// Record payment ₦800.00
    ///      │
    ///      ▼
    /// Overpayment { requested: ₦800.00, balance: ₦500.00 }
    ///      │
    ///      ▼
    /// UI shows: "Amount exceeds debt!" and nothing is written
    /// ```
    #[error("Amount exceeds debt: requested {requested}, balance {balance}")]
    Overpayment { requested: Money, balance: Money },

    /// A payment was posted for a name with no open balance.
    #[error("{name} has no open balance to pay against")]
    NoOpenBalance { name: String },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// The item is not in the cart.
    #[error("Item {0} is not in the cart")]
    ItemNotInCart(String),

    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., unparseable amount, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
