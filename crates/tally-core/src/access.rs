//! # Access Guard
//!
//! Roles, staff-map entries and the pure `authorize` check.
//!
//! ## Role Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   super_admin ⊇ admin ⊇ manager ⊇ staff                                │
//! │                                                                         │
//! │   staff        view catalog, cart, checkout, set own username          │
//! │   manager      + ledger postings, settle, item create/edit,             │
//! │                  soft delete/restore, trash, bulk price, CSV import,    │
//! │                  staff map, categories                                  │
//! │   admin        + cost prices, audit log                                 │
//! │   super_admin  everything; configured by email, not by staff map       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Staff Map Entries
//! The `staff` map of the store configuration holds two shapes side by side:
//!
//! ```text
//! "staff": {
//!     "old@shop.ng":   "manager",                          ← Legacy
//!     "amina@shop.ng": { "role": "staff", "name": "Amina" } ← Structured
//! }
//! ```
//!
//! Both deserialize into [`StaffEntry`] and are normalized into a [`Role`]
//! exactly once, in [`resolve_identity`].
//!
//! The check here is a convenience for the UI. The backing store enforces
//! the same policy on its side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::StoreConfig;
use crate::SUPER_ADMIN_DISPLAY_NAME;

// =============================================================================
// Role
// =============================================================================

/// Staff role, ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    #[default]
    Staff,
    Manager,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Position in the hierarchy (staff = 0).
    pub const fn tier(&self) -> u8 {
        match self {
            Role::Staff => 0,
            Role::Manager => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 3,
        }
    }

    /// True when this role includes everything `other` may do.
    pub fn at_least(&self, other: Role) -> bool {
        self.tier() >= other.tier()
    }

    /// Manager-tier or above.
    pub fn is_manager_tier(&self) -> bool {
        self.at_least(Role::Manager)
    }

    /// Admin-tier or above.
    pub fn is_admin_tier(&self) -> bool {
        self.at_least(Role::Admin)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "staff" => Ok(Role::Staff),
            "manager" => Ok(Role::Manager),
            "admin" | "administrator" => Ok(Role::Admin),
            "super_admin" | "superadmin" | "super-admin" => Ok(Role::SuperAdmin),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec![
                    "staff".to_string(),
                    "manager".to_string(),
                    "admin".to_string(),
                    "super_admin".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Staff Entry
// =============================================================================

/// One value of the staff map, in either of its stored shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum StaffEntry {
    /// `{ "role": "...", "name": "..." }`
    Structured {
        role: String,
        #[serde(default, alias = "username", skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A bare role string written by older clients.
    Legacy(String),
}

impl StaffEntry {
    /// Builds a structured entry.
    pub fn structured(role: Role, name: Option<String>) -> Self {
        StaffEntry::Structured {
            role: role.as_str().to_string(),
            name,
        }
    }

    /// Normalizes the stored role string.
    pub fn role(&self) -> Result<Role, ValidationError> {
        match self {
            StaffEntry::Structured { role, .. } => role.parse(),
            StaffEntry::Legacy(role) => role.parse(),
        }
    }

    /// Display name, if one has been chosen.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            StaffEntry::Structured { name: Some(name), .. } if !name.trim().is_empty() => {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

// =============================================================================
// Staff Identity
// =============================================================================

/// The caller as seen by the engine: who they are and what they may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffIdentity {
    /// Lowercased email supplied by the identity collaborator.
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
}

impl StaffIdentity {
    /// Staff members must pick a display name before using the app.
    pub fn needs_username(&self) -> bool {
        self.role != Role::SuperAdmin && self.display_name.is_none()
    }

    /// Name recorded on ledger history entries.
    pub fn actor_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Resolves an authenticated email against the store configuration.
///
/// ## Resolution Order
/// ```text
/// email == super admin email?  ──yes──► SuperAdmin ("Super Admin")
///        │ no
///        ▼
/// staff[email] present?        ──no───► AccessDenied
///        │ yes
///        ▼
/// Structured { role, name }  or  Legacy("role")
///        │
///        ▼
/// role string parses?          ──no───► AccessDenied
///        │ yes
///        ▼
/// StaffIdentity { email, role, display_name }
/// ```
pub fn resolve_identity(
    email: &str,
    config: &StoreConfig,
    super_admin_email: &str,
) -> CoreResult<StaffIdentity> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::required("email").into());
    }

    if email == super_admin_email.trim().to_lowercase() {
        return Ok(StaffIdentity {
            email,
            role: Role::SuperAdmin,
            display_name: Some(SUPER_ADMIN_DISPLAY_NAME.to_string()),
        });
    }

    let entry = config
        .staff
        .get(&email)
        .or_else(|| {
            config
                .staff
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&email))
                .map(|(_, entry)| entry)
        })
        .ok_or_else(|| CoreError::AccessDenied {
            email: email.clone(),
        })?;

    let role = entry.role().map_err(|_| CoreError::AccessDenied {
        email: email.clone(),
    })?;

    Ok(StaffIdentity {
        display_name: entry.display_name().map(str::to_string),
        email,
        role,
    })
}

// =============================================================================
// Operations
// =============================================================================

/// Every operation the engine gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewCatalog,
    AddToCart,
    Checkout,
    SetOwnUsername,
    PostLedger,
    SettleDebt,
    CreateItem,
    EditItem,
    SoftDeleteItem,
    RestoreItem,
    ViewTrash,
    BulkAdjustPrices,
    ImportCatalog,
    ManageStaff,
    ManageCategories,
    ViewCostPrice,
    SetCostPrice,
    ViewAuditLog,
}

impl Operation {
    /// Lowest role allowed to perform the operation.
    pub const fn required_role(&self) -> Role {
        match self {
            Operation::ViewCatalog
            | Operation::AddToCart
            | Operation::Checkout
            | Operation::SetOwnUsername => Role::Staff,

            Operation::PostLedger
            | Operation::SettleDebt
            | Operation::CreateItem
            | Operation::EditItem
            | Operation::SoftDeleteItem
            | Operation::RestoreItem
            | Operation::ViewTrash
            | Operation::BulkAdjustPrices
            | Operation::ImportCatalog
            | Operation::ManageStaff
            | Operation::ManageCategories => Role::Manager,

            Operation::ViewCostPrice | Operation::SetCostPrice | Operation::ViewAuditLog => {
                Role::Admin
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operation::ViewCatalog => "view the catalog",
            Operation::AddToCart => "add to the cart",
            Operation::Checkout => "check out",
            Operation::SetOwnUsername => "set a username",
            Operation::PostLedger => "post to the ledger",
            Operation::SettleDebt => "settle debts",
            Operation::CreateItem => "create items",
            Operation::EditItem => "edit items",
            Operation::SoftDeleteItem => "delete items",
            Operation::RestoreItem => "restore items",
            Operation::ViewTrash => "view the trash",
            Operation::BulkAdjustPrices => "adjust prices in bulk",
            Operation::ImportCatalog => "import items",
            Operation::ManageStaff => "manage staff",
            Operation::ManageCategories => "manage categories",
            Operation::ViewCostPrice => "view cost prices",
            Operation::SetCostPrice => "set cost prices",
            Operation::ViewAuditLog => "view the audit log",
        };
        f.write_str(text)
    }
}

/// Allows or denies `operation` for `role`.
///
/// ## Example
/// ```rust
/// use tally_core::access::{authorize, Operation, Role};
///
/// assert!(authorize(Role::Manager, Operation::PostLedger).is_ok());
/// assert!(authorize(Role::Staff, Operation::PostLedger).is_err());
/// assert!(authorize(Role::Manager, Operation::ViewCostPrice).is_err());
/// ```
pub fn authorize(role: Role, operation: Operation) -> CoreResult<()> {
    if role.at_least(operation.required_role()) {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied { operation, role })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config_with(entries: &[(&str, StaffEntry)]) -> StoreConfig {
        let staff: BTreeMap<String, StaffEntry> = entries
            .iter()
            .map(|(email, entry)| (email.to_string(), entry.clone()))
            .collect();
        StoreConfig {
            staff,
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::SuperAdmin.at_least(Role::Admin));
        assert!(Role::Admin.at_least(Role::Manager));
        assert!(Role::Manager.at_least(Role::Staff));
        assert!(!Role::Staff.at_least(Role::Manager));
        assert!(Role::Manager.is_manager_tier());
        assert!(!Role::Manager.is_admin_tier());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_staff_entry_shapes_deserialize() {
        let legacy: StaffEntry = serde_json::from_str(r#""manager""#).unwrap();
        assert_eq!(legacy.role().unwrap(), Role::Manager);
        assert_eq!(legacy.display_name(), None);

        let structured: StaffEntry =
            serde_json::from_str(r#"{"role":"staff","name":"Amina"}"#).unwrap();
        assert_eq!(structured.role().unwrap(), Role::Staff);
        assert_eq!(structured.display_name(), Some("Amina"));

        let aliased: StaffEntry =
            serde_json::from_str(r#"{"role":"admin","username":"Bala"}"#).unwrap();
        assert_eq!(aliased.display_name(), Some("Bala"));
    }

    #[test]
    fn test_resolve_super_admin() {
        let identity =
            resolve_identity("Boss@Shop.ng", &StoreConfig::default(), "boss@shop.ng").unwrap();
        assert_eq!(identity.role, Role::SuperAdmin);
        assert_eq!(identity.actor_name(), "Super Admin");
        assert!(!identity.needs_username());
    }

    #[test]
    fn test_resolve_structured_and_legacy() {
        let config = config_with(&[
            ("amina@shop.ng", StaffEntry::structured(Role::Staff, Some("Amina".into()))),
            ("old@shop.ng", StaffEntry::Legacy("manager".into())),
        ]);

        let amina = resolve_identity("AMINA@shop.ng", &config, "boss@shop.ng").unwrap();
        assert_eq!(amina.role, Role::Staff);
        assert_eq!(amina.actor_name(), "Amina");

        let old = resolve_identity("old@shop.ng", &config, "boss@shop.ng").unwrap();
        assert_eq!(old.role, Role::Manager);
        assert!(old.needs_username());
        assert_eq!(old.actor_name(), "old@shop.ng");
    }

    #[test]
    fn test_resolve_denies_unknown_email_and_role() {
        let config = config_with(&[("odd@shop.ng", StaffEntry::Legacy("owner".into()))]);

        let err = resolve_identity("stranger@shop.ng", &config, "boss@shop.ng").unwrap_err();
        assert!(matches!(err, CoreError::AccessDenied { .. }));

        let err = resolve_identity("odd@shop.ng", &config, "boss@shop.ng").unwrap_err();
        assert!(matches!(err, CoreError::AccessDenied { .. }));
    }

    #[test]
    fn test_authorize_matrix() {
        assert!(authorize(Role::Staff, Operation::Checkout).is_ok());
        assert!(authorize(Role::Staff, Operation::SetOwnUsername).is_ok());
        assert!(authorize(Role::Staff, Operation::SoftDeleteItem).is_err());

        assert!(authorize(Role::Manager, Operation::BulkAdjustPrices).is_ok());
        assert!(authorize(Role::Manager, Operation::ImportCatalog).is_ok());
        assert!(authorize(Role::Manager, Operation::SetCostPrice).is_err());

        assert!(authorize(Role::Admin, Operation::ViewCostPrice).is_ok());
        assert!(authorize(Role::SuperAdmin, Operation::ViewAuditLog).is_ok());

        let err = authorize(Role::Staff, Operation::SettleDebt).unwrap_err();
        assert_eq!(err.to_string(), "staff cannot settle debts");
    }
}
