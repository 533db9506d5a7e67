//! # Staff & Store Configuration
//!
//! Reads and edits the per-store `items/_config` document: the staff map
//! and the category list.
//!
//! ## Write Strategy
//! ```text
//! ┌────────────────────┬──────────────────────────────────────────────────┐
//! │ add_staff          │ merge {staff: {email: {role}}}                   │
//! │                    │ other keys untouched, existing name kept          │
//! ├────────────────────┼──────────────────────────────────────────────────┤
//! │ remove_staff       │ update: delete field path ["staff", email]       │
//! │                    │ dots in the email are not path separators         │
//! ├────────────────────┼──────────────────────────────────────────────────┤
//! │ set_username       │ merge {staff: {email: {role, name}}}             │
//! ├────────────────────┼──────────────────────────────────────────────────┤
//! │ add_category       │ update categories @ version v                    │
//! └────────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent merges to different emails are safe. Two managers editing the
//! same email race and the last write wins.

use std::sync::Arc;

use serde_json::{json, Value};
use tally_core::validation::{validate_category, validate_email, validate_username};
use tally_core::{
    AuditAction, CoreError, Operation, Role, StaffEntry, StoreConfig, StoreNamespace, ValidationError,
    CONFIG_DOCUMENT_ID,
};
use tally_store::{CollectionPath, DocumentStore, FieldChange, FieldPath, Precondition};
use tracing::info;

use crate::audit::AuditLog;
use crate::error::EngineResult;
use crate::session::Session;

/// Reads `items/_config`. `None` when the store has not been bootstrapped.
pub(crate) async fn read_config(
    store: &dyn DocumentStore,
    namespace: &StoreNamespace,
) -> EngineResult<Option<StoreConfig>> {
    match store
        .get(&CollectionPath::items(namespace), CONFIG_DOCUMENT_ID)
        .await?
    {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct StaffDirectory {
    store: Arc<dyn DocumentStore>,
    audit: AuditLog,
}

impl StaffDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, audit: AuditLog) -> Self {
        StaffDirectory { store, audit }
    }

    /// The store configuration, or the defaults when none is stored yet.
    pub async fn load_config(&self, namespace: &StoreNamespace) -> EngineResult<StoreConfig> {
        Ok(read_config(self.store.as_ref(), namespace)
            .await?
            .unwrap_or_default())
    }

    /// Grants `role` to `email`. Only admin-tier callers may grant admin.
    pub async fn add_staff(&self, session: &Session, email: &str, role: Role) -> EngineResult<()> {
        session.authorize(Operation::ManageStaff)?;

        if role == Role::SuperAdmin {
            return Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["staff".into(), "manager".into(), "admin".into()],
            }
            .into());
        }
        if role.is_admin_tier() && !session.role().is_admin_tier() {
            return Err(CoreError::PermissionDenied {
                operation: Operation::ManageStaff,
                role: session.role(),
            }
            .into());
        }

        let email = validate_email(email)?;
        let patch = json!({ "staff": { email.as_str(): { "role": role.as_str() } } });
        self.store
            .merge(&session.items_path(), CONFIG_DOCUMENT_ID, patch)
            .await?;

        info!(store = %session.namespace, email = %email, role = %role, "Staff added");
        self.audit
            .record(
                session,
                AuditAction::StaffAdded,
                format!("Added {} as {}", email, role),
                json!({ "email": email, "role": role.as_str() }),
            )
            .await;
        Ok(())
    }

    /// Removes `email` from the staff map. Managers cannot remove admins.
    pub async fn remove_staff(&self, session: &Session, email: &str) -> EngineResult<()> {
        session.authorize(Operation::ManageStaff)?;
        let email = validate_email(email)?;

        let config = self.load_config(&session.namespace).await?;
        let target_role = config.staff.get(&email).and_then(|entry| entry.role().ok());
        if target_role.is_some_and(|r| r.is_admin_tier()) && !session.role().is_admin_tier() {
            return Err(CoreError::PermissionDenied {
                operation: Operation::ManageStaff,
                role: session.role(),
            }
            .into());
        }

        self.store
            .update(
                &session.items_path(),
                CONFIG_DOCUMENT_ID,
                vec![FieldChange::Delete(FieldPath::new(["staff", email.as_str()]))],
                Precondition::Exists,
            )
            .await?;

        info!(store = %session.namespace, email = %email, "Staff removed");
        self.audit
            .record(
                session,
                AuditAction::StaffRemoved,
                format!("Removed {}", email),
                json!({ "email": email }),
            )
            .await;
        Ok(())
    }

    /// Stores the caller's display name and returns the refreshed session.
    pub async fn set_username(&self, session: &Session, name: &str) -> EngineResult<Session> {
        session.authorize(Operation::SetOwnUsername)?;
        if session.role() == Role::SuperAdmin {
            return Err(ValidationError::invalid_format("name", "the super admin name is fixed").into());
        }

        let name = validate_username(name)?;
        let entry = StaffEntry::structured(session.role(), Some(name.clone()));
        let patch = json!({ "staff": { session.email(): entry } });
        self.store
            .merge(&session.items_path(), CONFIG_DOCUMENT_ID, patch)
            .await?;

        self.audit
            .record(
                session,
                AuditAction::UsernameSet,
                format!("{} is now {}", session.email(), name),
                Value::Null,
            )
            .await;

        let mut updated = session.clone();
        updated.identity.display_name = Some(name);
        Ok(updated)
    }

    /// Adds a category unless it already exists (case-insensitive).
    ///
    /// Returns the category list after the write.
    pub async fn add_category(&self, session: &Session, name: &str) -> EngineResult<Vec<String>> {
        session.authorize(Operation::ManageCategories)?;
        let name = validate_category(name)?;
        let path = session.items_path();

        let current = self.store.get(&path, CONFIG_DOCUMENT_ID).await?;
        let (mut config, version) = match &current {
            Some(doc) => (doc.decode::<StoreConfig>()?, Some(doc.version)),
            None => (StoreConfig::default(), None),
        };

        if config.has_category(&name) {
            return Ok(config.categories);
        }
        config.categories.push(name.clone());

        match version {
            Some(v) => {
                self.store
                    .update(
                        &path,
                        CONFIG_DOCUMENT_ID,
                        vec![FieldChange::set("categories", json!(config.categories))],
                        Precondition::Version(v),
                    )
                    .await?;
            }
            None => {
                self.store
                    .merge(&path, CONFIG_DOCUMENT_ID, json!({ "categories": config.categories }))
                    .await?;
            }
        }

        self.audit
            .record(
                session,
                AuditAction::CategoryAdded,
                format!("Added category {}", name),
                Value::Null,
            )
            .await;
        Ok(config.categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{session_with_role, STORE_NAME};
    use tally_store::MemoryStore;

    fn directory() -> (Arc<MemoryStore>, StaffDirectory) {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditLog::new(store.clone());
        (store.clone(), StaffDirectory::new(store, audit))
    }

    fn ns() -> StoreNamespace {
        StoreNamespace::from_store_name(STORE_NAME).unwrap()
    }

    #[tokio::test]
    async fn test_load_config_defaults_when_missing() {
        let (_, staff) = directory();
        let config = staff.load_config(&ns()).await.unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[tokio::test]
    async fn test_add_and_remove_staff_with_dotted_email() {
        let (_, staff) = directory();
        let admin = session_with_role(Role::Admin);

        staff.add_staff(&admin, "Bala.Musa@Shop.ng", Role::Manager).await.unwrap();
        staff.add_staff(&admin, "ada@shop.ng", Role::Staff).await.unwrap();

        let config = staff.load_config(&ns()).await.unwrap();
        assert_eq!(config.staff.len(), 2);
        assert_eq!(config.staff["bala.musa@shop.ng"].role().unwrap(), Role::Manager);

        staff.remove_staff(&admin, "bala.musa@shop.ng").await.unwrap();
        let config = staff.load_config(&ns()).await.unwrap();
        assert_eq!(config.staff.len(), 1);
        assert!(config.staff.contains_key("ada@shop.ng"));
    }

    #[tokio::test]
    async fn test_role_change_keeps_display_name() {
        let (_, staff) = directory();
        let admin = session_with_role(Role::Admin);
        staff.add_staff(&admin, "ada@shop.ng", Role::Staff).await.unwrap();

        let mut ada = session_with_role(Role::Staff);
        ada.identity.email = "ada@shop.ng".to_string();
        let ada = staff.set_username(&ada, "Ada").await.unwrap();
        assert_eq!(ada.actor_name(), "Ada");

        staff.add_staff(&admin, "ada@shop.ng", Role::Manager).await.unwrap();
        let config = staff.load_config(&ns()).await.unwrap();
        let entry = &config.staff["ada@shop.ng"];
        assert_eq!(entry.role().unwrap(), Role::Manager);
        assert_eq!(entry.display_name(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_manager_cannot_grant_admin() {
        let (_, staff) = directory();
        let manager = session_with_role(Role::Manager);
        let err = staff.add_staff(&manager, "x@shop.ng", Role::Admin).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        let staff_member = session_with_role(Role::Staff);
        let err = staff.add_staff(&staff_member, "x@shop.ng", Role::Staff).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_short_username_rejected() {
        let (_, staff) = directory();
        let err = staff
            .set_username(&session_with_role(Role::Staff), "Al")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_add_category_dedupes() {
        let (store, staff) = directory();
        let manager = session_with_role(Role::Manager);
        store
            .create(&CollectionPath::items(&ns()), CONFIG_DOCUMENT_ID, json!({"staff": {}, "categories": ["General"]}))
            .await
            .unwrap();

        let categories = staff.add_category(&manager, " Drinks ").await.unwrap();
        assert_eq!(categories, vec!["General".to_string(), "Drinks".to_string()]);

        let again = staff.add_category(&manager, "drinks").await.unwrap();
        assert_eq!(again.len(), 2);
    }
}
