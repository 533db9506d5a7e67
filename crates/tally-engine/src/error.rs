//! # Engine Error Type
//!
//! Unified error returned by every engine operation.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tally POS                              │
//! │                                                                         │
//! │  UI                          Engine                                     │
//! │  ──                          ──────                                     │
//! │                                                                         │
//! │  ledger.post_transaction(..)                                            │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Engine Operation                                                │  │
//! │  │  EngineResult<T>                                                 │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Access Guard? ─── CoreError::PermissionDenied ─┐               │  │
//! │  │         │           (never reaches the store)    │               │  │
//! │  │         ▼                                        ▼               │  │
//! │  │  Validation? ───── CoreError::Validation ──── EngineError ─────►│  │
//! │  │         │                                        ▲               │  │
//! │  │         ▼                                        │               │  │
//! │  │  Store call ────── StoreError::QueryFailed ──────┘               │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Audit-log write failures never appear here: they are logged and       │
//! │  swallowed inside `AuditLog::record`.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! The UI receives both a machine-readable `code` and a one-line `message`.

use serde::Serialize;
use tally_core::CoreError;
use tally_store::StoreError;
use thiserror::Error;
use ts_rs::TS;

/// Error returned from engine operations.
///
/// ## Serialization
/// ```json
/// {
///   "code": "PERMISSION_DENIED",
///   "message": "Permission denied: staff cannot bulk adjust prices"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[error("{message}")]
pub struct EngineError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for engine responses.
///
/// ## Usage in the UI
/// ```typescript
/// switch (e.code) {
///   case 'PERMISSION_DENIED':
///     toast('Managers only');
///     break;
///   case 'CONFLICT':
///     toast('Someone else updated this record. Try again.');
///     break;
///   default:
///     toast(e.message);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCode {
    /// Bad amount, name or shape. Rejected before any store call.
    ValidationError,

    /// The caller's role does not allow the operation.
    PermissionDenied,

    /// The email is not on the store's staff list.
    AccessDenied,

    /// The target record does not exist.
    NotFound,

    /// Concurrent modification outlasted the retry budget.
    Conflict,

    /// Backend read, write or commit failed.
    StoreError,

    /// Cart operation rejected.
    CartError,

    /// Internal error
    Internal,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::StoreError => "STORE_ERROR",
            ErrorCode::CartError => "CART_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    /// Creates a new engine error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        EngineError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::ValidationError, message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Conflict, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Internal, message)
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code == ErrorCode::PermissionDenied
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Converts store errors to engine errors.
impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => EngineError::not_found(&collection, &id),
            StoreError::AlreadyExists { collection, id } => EngineError::conflict(format!(
                "{}/{} already exists",
                collection, id
            )),
            StoreError::Conflict { .. } => EngineError::conflict(err.to_string()),
            StoreError::BatchTooLarge { .. } => {
                EngineError::new(ErrorCode::StoreError, err.to_string())
            }
            StoreError::InvalidWrite(e) | StoreError::InvalidDocument(e) => {
                tracing::error!("Invalid document: {}", e);
                EngineError::new(ErrorCode::StoreError, "Stored data has an unexpected shape")
            }
            StoreError::ConnectionFailed(_) => {
                EngineError::new(ErrorCode::StoreError, "Store connection failed")
            }
            StoreError::MigrationFailed(_) => {
                EngineError::new(ErrorCode::StoreError, "Store migration failed")
            }
            StoreError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Store query failed: {}", e);
                EngineError::new(ErrorCode::StoreError, "Store operation failed")
            }
            StoreError::PoolExhausted => {
                EngineError::new(ErrorCode::StoreError, "Store connection pool exhausted")
            }
            StoreError::Internal(e) => {
                tracing::error!("Internal store error: {}", e);
                EngineError::internal("Store operation failed")
            }
        }
    }
}

/// Converts core errors to engine errors.
impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            CoreError::AccessDenied { .. } => ErrorCode::AccessDenied,
            CoreError::Overpayment { .. }
            | CoreError::NoOpenBalance { .. }
            | CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::ItemNotInCart(_)
            | CoreError::EmptyCart => ErrorCode::CartError,
        };
        EngineError::new(code, err.to_string())
    }
}

impl From<tally_core::ValidationError> for EngineError {
    fn from(err: tally_core::ValidationError) -> Self {
        EngineError::from(CoreError::from(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::from(StoreError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Money, Operation, Role, ValidationError};

    #[test]
    fn test_core_error_codes() {
        let denied: EngineError = CoreError::PermissionDenied {
            operation: Operation::BulkAdjustPrices,
            role: Role::Staff,
        }
        .into();
        assert_eq!(denied.code, ErrorCode::PermissionDenied);
        assert!(denied.is_permission_denied());

        let over: EngineError = CoreError::Overpayment {
            requested: Money::from_major(600),
            balance: Money::from_major(500),
        }
        .into();
        assert_eq!(over.code, ErrorCode::ValidationError);

        let empty: EngineError = CoreError::EmptyCart.into();
        assert_eq!(empty.code, ErrorCode::CartError);

        let invalid: EngineError = ValidationError::required("name").into();
        assert_eq!(invalid.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_store_error_codes() {
        let missing: EngineError = StoreError::not_found("pk_store_x/debtors", "d_amina").into();
        assert_eq!(missing.code, ErrorCode::NotFound);

        let conflict: EngineError = StoreError::Conflict {
            collection: "pk_store_x/debtors".into(),
            id: "d_amina".into(),
            expected: 3,
            actual: Some(4),
        }
        .into();
        assert_eq!(conflict.code, ErrorCode::Conflict);

        let failed: EngineError = StoreError::QueryFailed("disk I/O error".into()).into();
        assert_eq!(failed.code, ErrorCode::StoreError);
        assert_eq!(failed.message, "Store operation failed");
    }

    #[test]
    fn test_serializes_screaming_code() {
        let err = EngineError::validation("Amount must be positive");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["message"], "Amount must be positive");
        assert_eq!(ErrorCode::StoreError.to_string(), "STORE_ERROR");
    }
}
