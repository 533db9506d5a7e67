//! # Session Context
//!
//! The explicit "who and where" passed into every engine call: the store
//! being worked on and the staff member working on it.
//!
//! ## Establishing a Session
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Session::establish(store, "Mama Put", "bala@shop.ng", super_admin)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate store name (≥ 2 chars) ──► namespace "pk_store_mamaput"       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read items/_config                                                     │
//! │       │                                                                 │
//! │       ├── missing + super admin ──► create {staff: {}, categories}      │
//! │       ├── missing + anyone else ──► empty staff map                     │
//! │       ▼                                                                 │
//! │  resolve_identity(email, config) ──► AccessDenied if not on the list    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Session { store_name, namespace, identity }                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tally_core::validation::validate_store_name;
use tally_core::{
    authorize, resolve_identity, Operation, Role, StaffIdentity, StoreConfig, StoreNamespace,
    CONFIG_DOCUMENT_ID,
};
use tally_store::{CollectionPath, DocumentStore};
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::staff::read_config;

/// An authenticated staff member working in one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Store name as typed, trimmed.
    pub store_name: String,
    pub namespace: StoreNamespace,
    pub identity: StaffIdentity,
}

impl Session {
    /// Resolves `email` against the store's staff map and opens a session.
    pub async fn establish(
        store: &dyn DocumentStore,
        store_name: &str,
        email: &str,
        super_admin_email: &str,
    ) -> EngineResult<Session> {
        let store_name = validate_store_name(store_name)?;
        let namespace = StoreNamespace::from_store_name(&store_name)?;

        let config = match read_config(store, &namespace).await? {
            Some(config) => config,
            None => {
                let is_super_admin = !super_admin_email.trim().is_empty()
                    && email.trim().eq_ignore_ascii_case(super_admin_email.trim());
                if is_super_admin {
                    bootstrap_config(store, &namespace).await?
                } else {
                    StoreConfig::default()
                }
            }
        };

        let identity = resolve_identity(email, &config, super_admin_email)?;
        debug!(store = %namespace, email = %identity.email, role = %identity.role, "Session established");

        Ok(Session::new(store_name, namespace, identity))
    }

    /// Builds a session from already-resolved parts.
    pub fn new(store_name: impl Into<String>, namespace: StoreNamespace, identity: StaffIdentity) -> Self {
        Session {
            store_name: store_name.into(),
            namespace,
            identity,
        }
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }

    pub fn email(&self) -> &str {
        &self.identity.email
    }

    /// Display name written into history entries. Falls back to the email.
    pub fn actor_name(&self) -> &str {
        self.identity.actor_name()
    }

    /// Access Guard check for this caller.
    pub fn authorize(&self, operation: Operation) -> EngineResult<()> {
        authorize(self.identity.role, operation)?;
        Ok(())
    }

    pub fn can_view_cost(&self) -> bool {
        self.identity.role.is_admin_tier()
    }

    pub fn items_path(&self) -> CollectionPath {
        CollectionPath::items(&self.namespace)
    }

    pub fn debtors_path(&self) -> CollectionPath {
        CollectionPath::debtors(&self.namespace)
    }

    pub fn logs_path(&self) -> CollectionPath {
        CollectionPath::logs(&self.namespace)
    }
}

/// Writes the initial `_config` document for a new store.
async fn bootstrap_config(store: &dyn DocumentStore, namespace: &StoreNamespace) -> EngineResult<StoreConfig> {
    let config = StoreConfig::default();
    let data = serde_json::to_value(&config)?;

    match store
        .create(&CollectionPath::items(namespace), CONFIG_DOCUMENT_ID, data)
        .await
    {
        Ok(_) => {
            info!(store = %namespace, "Store configuration created");
            Ok(config)
        }
        // Another device bootstrapped first; use theirs.
        Err(e) if e.is_already_exists() => Ok(read_config(store, namespace).await?.unwrap_or(config)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;
    use tally_store::MemoryStore;

    const OWNER: &str = "owner@shop.ng";

    #[tokio::test]
    async fn test_super_admin_bootstraps_config() {
        let store = MemoryStore::new();
        let session = Session::establish(&store, "Mama Put", "Owner@Shop.ng", OWNER)
            .await
            .unwrap();

        assert_eq!(session.role(), Role::SuperAdmin);
        assert_eq!(session.actor_name(), "Super Admin");
        assert_eq!(session.namespace.as_str(), "pk_store_mamaput");

        let config = read_config(&store, &session.namespace).await.unwrap().unwrap();
        assert_eq!(config.categories, vec!["General".to_string()]);
        assert!(config.staff.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_email_denied() {
        let store = MemoryStore::new();
        let err = Session::establish(&store, "Mama Put", "stranger@mail.ng", OWNER)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AccessDenied);
    }

    #[tokio::test]
    async fn test_staff_member_resolves_role_and_name() {
        let store = MemoryStore::new();
        let ns = StoreNamespace::from_store_name("Mama Put").unwrap();
        store
            .create(
                &CollectionPath::items(&ns),
                CONFIG_DOCUMENT_ID,
                json!({
                    "staff": {
                        "bala@shop.ng": {"role": "manager", "name": "Bala"},
                        "ada@shop.ng": "staff"
                    },
                    "categories": ["General", "Drinks"]
                }),
            )
            .await
            .unwrap();

        let bala = Session::establish(&store, "Mama Put", "bala@shop.ng", OWNER).await.unwrap();
        assert_eq!(bala.role(), Role::Manager);
        assert_eq!(bala.actor_name(), "Bala");
        assert!(bala.authorize(Operation::PostLedger).is_ok());
        assert!(!bala.can_view_cost());

        let ada = Session::establish(&store, "Mama Put", "ada@shop.ng", OWNER).await.unwrap();
        assert_eq!(ada.role(), Role::Staff);
        assert!(ada.identity.needs_username());
        assert_eq!(ada.actor_name(), "ada@shop.ng");
        assert!(ada.authorize(Operation::PostLedger).is_err());
    }

    #[tokio::test]
    async fn test_short_store_name_rejected() {
        let store = MemoryStore::new();
        let err = Session::establish(&store, "x", OWNER, OWNER).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
