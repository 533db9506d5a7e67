//! # Engine Facade
//!
//! Opens the configured document store and hands out the components that
//! share it.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine::open(config)                                                   │
//! │                                                                         │
//! │  1. config.validate() ─── bad value ──► VALIDATION_ERROR                │
//! │                                                                         │
//! │  2. Build the backend                                                   │
//! │     • memory: MemoryStore (tests, demos)                                │
//! │     • sqlite: SqliteStore at database_path, migrations applied          │
//! │                                                                         │
//! │  3. Shared parts                                                        │
//! │     • AuditLog (one per engine)                                         │
//! │     • CartState (one cart per engine, like one till)                    │
//! │                                                                         │
//! │  4. sign_in(store_name, email) ──► Session                              │
//! │     then ledger() / inventory() / batch() / checkout() / staff()        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tally_store::{DocumentStore, MemoryStore, SqliteStore, SqliteStoreConfig};
use tracing::info;

use crate::audit::AuditLog;
use crate::batch::BatchMutator;
use crate::checkout::{CartState, Checkout};
use crate::config::{EngineConfig, StoreBackend};
use crate::error::EngineResult;
use crate::inventory::InventoryReplica;
use crate::ledger::BalanceLedger;
use crate::session::Session;
use crate::staff::StaffDirectory;

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
    audit: AuditLog,
    cart: CartState,
}

impl Engine {
    /// Validates `config` and connects to its backend.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Sqlite => {
                let sqlite = SqliteStore::connect(SqliteStoreConfig::new(config.database_path.clone())).await?;
                Arc::new(sqlite)
            }
        };

        info!(backend = %config.store_backend, "Engine opened");
        Self::with_store(store, config)
    }

    /// Builds an engine over an existing store.
    pub fn with_store(store: Arc<dyn DocumentStore>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let audit = AuditLog::new(store.clone());
        Ok(Engine {
            store,
            config,
            audit,
            cart: CartState::new(),
        })
    }

    /// Resolves `email` against the store's staff map.
    pub async fn sign_in(&self, store_name: &str, email: &str) -> EngineResult<Session> {
        let session = Session::establish(
            self.store.as_ref(),
            store_name,
            email,
            &self.config.super_admin_email,
        )
        .await?;
        info!(store = %session.namespace, role = %session.role(), "Signed in");
        Ok(session)
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn audit(&self) -> AuditLog {
        self.audit.clone()
    }

    pub fn ledger(&self) -> BalanceLedger {
        BalanceLedger::new(self.store.clone(), self.audit.clone(), &self.config)
    }

    /// A new replica with no sync running.
    pub fn inventory(&self) -> InventoryReplica {
        InventoryReplica::new(self.store.clone(), self.audit.clone(), self.config.trash_limit)
    }

    pub fn batch(&self) -> BatchMutator {
        BatchMutator::new(self.store.clone(), self.audit.clone(), &self.config)
    }

    /// Checkout over the engine's single cart.
    pub fn checkout(&self) -> Checkout {
        Checkout::new(self.cart.clone(), self.audit.clone(), &self.config)
    }

    pub fn staff(&self) -> StaffDirectory {
        StaffDirectory::new(self.store.clone(), self.audit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::ledger::Posting;
    use tally_core::pricing::PriceDirection;
    use tally_core::{Money, Role};

    const OWNER: &str = "owner@shop.ng";

    async fn engine() -> Engine {
        Engine::open(EngineConfig::in_memory(OWNER)).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let mut config = EngineConfig::in_memory(OWNER);
        config.batch_budget = 0;
        let err = Engine::open(config).await.err().unwrap();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_owner_bootstraps_then_staff_signs_in() {
        let engine = engine().await;

        let owner = engine.sign_in("Mama Put", OWNER).await.unwrap();
        assert_eq!(owner.role(), Role::SuperAdmin);

        let err = engine.sign_in("Mama Put", "ada@shop.ng").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AccessDenied);

        engine.staff().add_staff(&owner, "ada@shop.ng", Role::Manager).await.unwrap();
        let ada = engine.sign_in("Mama Put", "ADA@shop.ng").await.unwrap();
        assert_eq!(ada.role(), Role::Manager);
    }

    #[tokio::test]
    async fn test_components_share_one_store() {
        let engine = engine().await;
        let owner = engine.sign_in("Mama Put", OWNER).await.unwrap();

        engine
            .batch()
            .import_from_delimited_text(&owner, "name,barcode,price\nRice,600123,4500\n")
            .await
            .unwrap();
        engine
            .batch()
            .apply_percentage_adjustment(&owner, PriceDirection::Increase, "10")
            .await
            .unwrap();
        engine
            .ledger()
            .post_transaction(&owner, Posting::debt("Bala", Money::from_major(300)))
            .await
            .unwrap();

        let total = engine.ledger().total_outstanding(&owner).await.unwrap();
        assert_eq!(total, Money::from_major(300));

        let entries = engine.audit().recent(&owner, 10).await.unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_checkout_handles_share_cart() {
        let engine = engine().await;
        let owner = engine.sign_in("Mama Put", OWNER).await.unwrap();
        let item = engine
            .inventory()
            .save_item(
                &owner,
                None,
                tally_core::ItemDraft {
                    name: "Rice".into(),
                    price: Money::from_major(4500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        engine.checkout().add_item(&owner, &item, 2).unwrap();
        assert_eq!(engine.checkout().cart().totals().total_quantity, 2);

        let receipt = engine.checkout().checkout(&owner).await.unwrap();
        assert_eq!(receipt.total, Money::from_major(9000));
    }
}
