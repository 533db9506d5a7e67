//! # Ledger Module
//!
//! Pure posting math for debtor records. The engine reads a debtor, asks this
//! module what the record should become, and writes the answer back with a
//! version precondition.
//!
//! ## Posting State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   absent ──debt──► Debtor::open ──► active(balance > 0)                 │
//! │     │                                  │                                │
//! │     └─payment──► NoOpenBalance         ├─debt──────► Updated            │
//! │                                        ├─payment < balance ► Updated    │
//! │                                        ├─payment = balance ► Settled    │
//! │                                        └─payment > balance ► Overpayment│
//! │                                                                         │
//! │   Settled means the record is deleted. A later posting for the same     │
//! │   name starts a new record with an empty history.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{debtor_name_key, Debtor, EntryType, HistoryEntry};
use crate::validation::{validate_amount, validate_debtor_name};

/// What a posting does to an existing debtor record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostingEffect {
    /// The record stays, with the new balance and the entry prepended.
    Updated(Debtor),
    /// The balance reached zero; the record must be deleted.
    Settled,
}

impl Debtor {
    /// Builds the record for the first posting of an unknown name.
    ///
    /// A payment cannot open a record: store credit is not modelled.
    pub fn open(name: &str, entry: HistoryEntry, now: DateTime<Utc>) -> CoreResult<Debtor> {
        let name = validate_debtor_name(name)?;
        validate_amount(entry.amount)?;

        if entry.kind == EntryType::Payment {
            return Err(CoreError::NoOpenBalance { name });
        }

        let name_key = debtor_name_key(&name);
        Ok(Debtor {
            id: debtor_id_for_key(&name_key),
            name,
            name_key,
            current_balance: entry.amount,
            history: vec![entry],
            created_at: now,
            last_updated: now,
        })
    }

    /// Applies one posting to this record.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::Utc;
    /// use tally_core::ledger::PostingEffect;
    /// use tally_core::money::Money;
    /// use tally_core::types::{Debtor, EntryType, HistoryEntry};
    ///
    /// let now = Utc::now();
    /// let rice = HistoryEntry::new(EntryType::Debt, Money::from_major(500), Some("rice"), now, "Bala");
    /// let amina = Debtor::open("Amina", rice, now).unwrap();
    ///
    /// let pay = HistoryEntry::new(EntryType::Payment, Money::from_major(500), None, now, "Bala");
    /// assert_eq!(amina.apply(pay, now).unwrap(), PostingEffect::Settled);
    /// ```
    pub fn apply(&self, entry: HistoryEntry, now: DateTime<Utc>) -> CoreResult<PostingEffect> {
        validate_amount(entry.amount)?;

        if entry.kind == EntryType::Payment && entry.amount > self.current_balance {
            return Err(CoreError::Overpayment {
                requested: entry.amount,
                balance: self.current_balance,
            });
        }

        let new_balance = self
            .current_balance
            .checked_add(entry.signed_amount())
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: 1,
                max: i64::MAX.saturating_sub(self.current_balance.cents()),
            })?;
        if entry.kind == EntryType::Payment && !new_balance.is_positive() {
            return Ok(PostingEffect::Settled);
        }

        let mut next = self.clone();
        next.current_balance = new_balance;
        next.history.insert(0, entry);
        next.last_updated = now;
        Ok(PostingEffect::Updated(next))
    }

    /// Checks `currentBalance == Σ signed history`.
    pub fn is_consistent(&self) -> bool {
        let derived: Money = self.history.iter().map(HistoryEntry::signed_amount).sum();
        derived == self.current_balance
    }
}

/// Deterministic document id for a debtor name key.
///
/// ASCII alphanumerics are kept. Any other character becomes `_{hex}_`,
/// its code point in hex between two underscores. A bare `_` never appears
/// outside an escape, so the id reads back to exactly one key: different
/// keys get different ids, and a concurrent first posting for the same name
/// collides on create instead of producing a duplicate.
///
/// ## Example
/// ```rust
/// use tally_core::ledger::debtor_id_for_key;
///
/// assert_eq!(debtor_id_for_key("amina bello"), "d_amina_20_bello");
/// assert_ne!(debtor_id_for_key("a-b"), debtor_id_for_key("a_b"));
/// // ā followed by "a" is not the single character U+101A.
/// assert_ne!(debtor_id_for_key("\u{101}a"), debtor_id_for_key("\u{101A}"));
/// ```
pub fn debtor_id_for_key(name_key: &str) -> String {
    let mut id = String::with_capacity(name_key.len() + 2);
    id.push_str("d_");
    for ch in name_key.chars() {
        if ch.is_ascii_alphanumeric() {
            id.push(ch);
        } else {
            id.push_str(&format!("_{:x}_", ch as u32));
        }
    }
    id
}

/// Sum of every open balance.
pub fn total_outstanding(debtors: &[Debtor]) -> Money {
    debtors.iter().map(|d| d.current_balance).sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
