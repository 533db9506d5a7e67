//! # Balance Ledger
//!
//! Debtor records, their postings and settlement, kept consistent across
//! devices posting at the same time.
//!
//! ## Posting Flow (optimistic compare-and-swap)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  post_transaction(session, posting)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Access Guard (PostLedger) + amount > 0       ── no store call on fail  │
//! │       │                                                                 │
//! │  ┌────▼───────────────────────────── attempt 1..=max_retries ───────┐  │
//! │  │                                                                   │  │
//! │  │  target id?  ──yes──► get(debtors, id) ── missing ──► Vanished    │  │
//! │  │      │ no                                                         │  │
//! │  │      ▼                                                            │  │
//! │  │  query nameKey == key, lastUpdated desc, limit 1                  │  │
//! │  │      │                                                            │  │
//! │  │      ├── none ──► Debtor::open ──► create(d_<key>)                │  │
//! │  │      │                  AlreadyExists ──► next attempt           │  │
//! │  │      ▼                                                            │  │
//! │  │  doc @ version v ──► Debtor::apply                                │  │
//! │  │      ├── Updated ──► set(doc, Version(v))                         │  │
//! │  │      └── Settled ──► delete(Version(v))                           │  │
//! │  │                Conflict ──► next attempt                          │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  audit (best effort) ──► PostingOutcome                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two devices posting 100 each against the same debtor always end at 200:
//! the second writer's version check fails, it re-reads and re-applies.

use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tally_core::validation::{validate_amount, validate_debtor_name};
use tally_core::{
    debtor_name_key, total_outstanding, AuditAction, Debtor, EntryType, HistoryEntry, Money, Operation,
    PostingEffect,
};
use tally_store::{Document, DocumentStore, Precondition, Query, SortDirection, Subscription};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::audit::AuditLog;
use crate::config::EngineConfig;
use crate::document_body;
use crate::error::{EngineError, EngineResult};
use crate::session::Session;

// =============================================================================
// Postings
// =============================================================================

/// One debt or payment to post.
///
/// ## Example
/// ```rust,ignore
/// let rice = Posting::debt("Amina", Money::from_major(500)).description("rice");
/// let pay = Posting::payment("Amina", Money::from_major(200)).target("d_amina");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub debtor_name: String,
    pub description: Option<String>,
    pub amount: Money,
    pub kind: EntryType,
    /// Post against this record instead of looking the name up.
    pub target_debtor_id: Option<String>,
}

impl Posting {
    pub fn new(debtor_name: impl Into<String>, amount: Money, kind: EntryType) -> Self {
        Posting {
            debtor_name: debtor_name.into(),
            description: None,
            amount,
            kind,
            target_debtor_id: None,
        }
    }

    pub fn debt(debtor_name: impl Into<String>, amount: Money) -> Self {
        Posting::new(debtor_name, amount, EntryType::Debt)
    }

    pub fn payment(debtor_name: impl Into<String>, amount: Money) -> Self {
        Posting::new(debtor_name, amount, EntryType::Payment)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn target(mut self, debtor_id: impl Into<String>) -> Self {
        self.target_debtor_id = Some(debtor_id.into());
        self
    }
}

/// What a posting did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PostingOutcome {
    /// First posting for the name; a new record was written.
    Created(Debtor),
    /// The existing record now carries the new balance.
    Updated(Debtor),
    /// A payment cleared the balance and the record was deleted.
    #[serde(rename_all = "camelCase")]
    Settled { debtor_id: String, name: String },
    /// The targeted record no longer exists (settled elsewhere). Nothing was written.
    #[serde(rename_all = "camelCase")]
    Vanished { debtor_id: String },
}

impl PostingOutcome {
    /// The record as it now stands, if it still exists.
    pub fn debtor(&self) -> Option<&Debtor> {
        match self {
            PostingOutcome::Created(d) | PostingOutcome::Updated(d) => Some(d),
            _ => None,
        }
    }
}

/// Result of a single attempt inside the retry loop.
enum Attempt {
    Done(PostingOutcome),
    Retry,
}

// =============================================================================
// Balance Ledger
// =============================================================================

#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn DocumentStore>,
    audit: AuditLog,
    max_retries: u32,
    currency_symbol: String,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn DocumentStore>, audit: AuditLog, config: &EngineConfig) -> Self {
        BalanceLedger {
            store,
            audit,
            max_retries: config.ledger_max_retries.max(1),
            currency_symbol: config.currency_symbol.clone(),
        }
    }

    /// Posts a debt or payment.
    ///
    /// ## Errors
    /// - `PERMISSION_DENIED` below manager tier
    /// - `VALIDATION_ERROR` for a non-positive amount, a blank name, a payment
    ///   above the balance, or a payment for a name with no open balance
    /// - `CONFLICT` when every attempt lost a race
    pub async fn post_transaction(&self, session: &Session, posting: Posting) -> EngineResult<PostingOutcome> {
        session.authorize(Operation::PostLedger)?;
        validate_amount(posting.amount)?;
        if posting.target_debtor_id.is_none() {
            validate_debtor_name(&posting.debtor_name)?;
        }

        let now = Utc::now();
        let entry = HistoryEntry::new(
            posting.kind,
            posting.amount,
            posting.description.as_deref(),
            now,
            session.actor_name(),
        );

        for attempt in 1..=self.max_retries {
            match self.attempt_posting(session, &posting, &entry).await? {
                Attempt::Done(outcome) => {
                    self.record_posting(session, &posting, &outcome).await;
                    return Ok(outcome);
                }
                Attempt::Retry => {
                    debug!(
                        store = %session.namespace,
                        debtor = %posting.debtor_name,
                        attempt,
                        "Posting lost a race, retrying"
                    );
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(
            store = %session.namespace,
            debtor = %posting.debtor_name,
            attempts = self.max_retries,
            "Posting gave up after repeated conflicts"
        );
        Err(EngineError::conflict(format!(
            "{} was updated on another device too many times. Try again.",
            posting.debtor_name.trim()
        )))
    }

    async fn attempt_posting(
        &self,
        session: &Session,
        posting: &Posting,
        entry: &HistoryEntry,
    ) -> EngineResult<Attempt> {
        let path = session.debtors_path();
        let now = entry.date;

        let current = match &posting.target_debtor_id {
            Some(id) => match self.store.get(&path, id).await? {
                Some(doc) => doc,
                None => {
                    return Ok(Attempt::Done(PostingOutcome::Vanished {
                        debtor_id: id.clone(),
                    }))
                }
            },
            None => match self.find_by_name(session, &posting.debtor_name).await? {
                Some(doc) => doc,
                None => {
                    let debtor = Debtor::open(&posting.debtor_name, entry.clone(), now)?;
                    return match self.store.create(&path, &debtor.id, document_body(&debtor)?).await {
                        Ok(_) => {
                            info!(store = %session.namespace, debtor_id = %debtor.id, "Debtor created");
                            Ok(Attempt::Done(PostingOutcome::Created(debtor)))
                        }
                        Err(e) if e.is_already_exists() => Ok(Attempt::Retry),
                        Err(e) => Err(e.into()),
                    };
                }
            },
        };

        let debtor: Debtor = current.decode()?;
        let version = Precondition::Version(current.version);

        let written = match debtor.apply(entry.clone(), now)? {
            PostingEffect::Updated(mut next) => {
                if next.name_key.is_empty() {
                    next.name_key = debtor_name_key(&next.name);
                }
                self.store
                    .set(&path, &current.id, document_body(&next)?, version)
                    .await
                    .map(|_| PostingOutcome::Updated(next))
            }
            PostingEffect::Settled => self
                .store
                .delete(&path, &current.id, version)
                .await
                .map(|_| PostingOutcome::Settled {
                    debtor_id: debtor.id.clone(),
                    name: debtor.name.clone(),
                }),
        };

        match written {
            Ok(outcome) => Ok(Attempt::Done(outcome)),
            Err(e) if e.is_conflict() => Ok(Attempt::Retry),
            // Deleted between our read and write.
            Err(e) if e.is_not_found() => match &posting.target_debtor_id {
                Some(id) => Ok(Attempt::Done(PostingOutcome::Vanished { debtor_id: id.clone() })),
                None => Ok(Attempt::Retry),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Newest open record whose name key matches.
    async fn find_by_name(&self, session: &Session, name: &str) -> EngineResult<Option<Document>> {
        let query = Query::new(session.debtors_path())
            .where_eq("nameKey", debtor_name_key(name))
            .order_by("lastUpdated", SortDirection::Descending)
            .limit(1);
        Ok(self.store.query(&query).await?.into_iter().next())
    }

    async fn record_posting(&self, session: &Session, posting: &Posting, outcome: &PostingOutcome) {
        let amount = posting.amount.format_with_symbol(&self.currency_symbol);
        let (action, details, meta) = match outcome {
            PostingOutcome::Vanished { .. } => return,
            PostingOutcome::Settled { debtor_id, name } => (
                AuditAction::DebtSettled,
                format!("Settled {}", name),
                json!({ "debtorId": debtor_id, "amount": posting.amount }),
            ),
            PostingOutcome::Created(d) | PostingOutcome::Updated(d) => {
                let (action, details) = match posting.kind {
                    EntryType::Debt => (AuditAction::DebtAdded, format!("Added {} debt for {}", amount, d.name)),
                    EntryType::Payment => (AuditAction::PaymentReceived, format!("Received {} from {}", amount, d.name)),
                };
                (
                    action,
                    details,
                    json!({ "debtorId": d.id, "amount": posting.amount, "balance": d.current_balance }),
                )
            }
        };
        self.audit.record(session, action, details, meta).await;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Live feed of open balances whose name contains `filter`.
    pub fn list_debtors(&self, session: &Session, filter: &str) -> DebtorFeed {
        let query = Query::new(session.debtors_path()).order_by("lastUpdated", SortDirection::Descending);
        DebtorFeed {
            subscription: tally_store::subscribe(self.store.clone(), query),
            filter: filter.trim().to_lowercase(),
        }
    }

    /// One debtor, history newest first.
    pub async fn get_debtor(&self, session: &Session, debtor_id: &str) -> EngineResult<Option<Debtor>> {
        match self.store.get(&session.debtors_path(), debtor_id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Sum of every open balance in the store.
    pub async fn total_outstanding(&self, session: &Session) -> EngineResult<Money> {
        let docs = self.store.query(&Query::new(session.debtors_path())).await?;
        let debtors = decode_open_debtors(&docs, "");
        Ok(total_outstanding(&debtors))
    }

    /// Deletes the record regardless of balance. Manager tier.
    ///
    /// Returns `false` when the record was already gone.
    pub async fn settle_full(&self, session: &Session, debtor_id: &str) -> EngineResult<bool> {
        session.authorize(Operation::SettleDebt)?;
        let path = session.debtors_path();

        let Some(doc) = self.store.get(&path, debtor_id).await? else {
            debug!(store = %session.namespace, debtor_id, "Settle on missing debtor ignored");
            return Ok(false);
        };
        let debtor: Debtor = doc.decode()?;

        self.store.delete(&path, debtor_id, Precondition::None).await?;
        info!(store = %session.namespace, debtor_id, "Debtor settled in full");

        self.audit
            .record(
                session,
                AuditAction::DebtSettled,
                format!("Settled {}", debtor.name),
                json!({ "debtorId": debtor_id, "amount": debtor.current_balance }),
            )
            .await;
        Ok(true)
    }
}

/// Decodes snapshot documents into the open-balance view.
fn decode_open_debtors(docs: &[Document], filter: &str) -> Vec<Debtor> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<Debtor>() {
            Ok(d) => Some(d),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping unreadable debtor");
                None
            }
        })
        .filter(|d| d.current_balance.is_positive() && d.name.to_lowercase().contains(filter))
        .collect()
}

// =============================================================================
// Debtor Feed
// =============================================================================

/// Live, filtered view over the debtors collection.
///
/// Each item is the full filtered list, newest activity first. Dropping the
/// feed ends the underlying subscription.
#[derive(Debug)]
pub struct DebtorFeed {
    subscription: Subscription,
    filter: String,
}

impl DebtorFeed {
    pub async fn next(&mut self) -> Option<Vec<Debtor>> {
        let docs = self.subscription.next().await?;
        Some(decode_open_debtors(&docs, &self.filter))
    }

    pub fn cancel(&mut self) {
        self.subscription.cancel();
    }

    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = Vec<Debtor>> + Send>> {
        let filter = self.filter;
        Box::pin(
            self.subscription
                .into_stream()
                .map(move |docs| decode_open_debtors(&docs, &filter)),
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
