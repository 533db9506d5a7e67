//! # Write Batches
//!
//! The write model shared by every backend.
//!
//! ## Batch Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WriteBatch::new()                                                      │
//! │    .update(debtors, "d_amina", [balance, history], Version(3))          │
//! │    .create(logs, uuid, {...})                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  store.commit(batch)                                                    │
//! │       │                                                                 │
//! │       ├── len > max_batch_size ──► BatchTooLarge  (nothing written)     │
//! │       ├── any precondition miss ─► Conflict / NotFound / AlreadyExists  │
//! │       │                            (nothing written)                    │
//! │       ▼                                                                 │
//! │  all ops applied ──► CommitReceipt + one ChangeEvent per collection     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::document::{CollectionPath, Document, FieldPath};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Operations
// =============================================================================

/// Condition checked against the current document before a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precondition {
    #[default]
    None,
    /// The document must exist.
    Exists,
    /// The document must exist at exactly this version.
    Version(u64),
}

/// One change to a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Set(FieldPath, Value),
    /// Removes the key. Missing keys are ignored.
    Delete(FieldPath),
}

impl FieldChange {
    /// Sets a top-level field.
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldChange::Set(FieldPath::field(field), value.into())
    }
}

/// Kind of write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteKind {
    /// Fails with `AlreadyExists` when the id is taken.
    Create(Value),
    /// Replaces the whole body.
    Set(Value, Precondition),
    /// Deep-merges objects; creates the document when absent.
    Merge(Value),
    /// Applies field changes; fails with `NotFound` when absent.
    Update(Vec<FieldChange>, Precondition),
    Delete(Precondition),
}

/// A write against one document.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub path: CollectionPath,
    pub id: String,
    pub kind: WriteKind,
}

/// An ordered list of writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    pub fn push(&mut self, path: &CollectionPath, id: impl Into<String>, kind: WriteKind) -> &mut Self {
        self.ops.push(WriteOp {
            path: path.clone(),
            id: id.into(),
            kind,
        });
        self
    }

    pub fn create(&mut self, path: &CollectionPath, id: impl Into<String>, data: Value) -> &mut Self {
        self.push(path, id, WriteKind::Create(data))
    }

    pub fn set(&mut self, path: &CollectionPath, id: impl Into<String>, data: Value, pre: Precondition) -> &mut Self {
        self.push(path, id, WriteKind::Set(data, pre))
    }

    pub fn merge(&mut self, path: &CollectionPath, id: impl Into<String>, data: Value) -> &mut Self {
        self.push(path, id, WriteKind::Merge(data))
    }

    pub fn update(
        &mut self,
        path: &CollectionPath,
        id: impl Into<String>,
        changes: Vec<FieldChange>,
        pre: Precondition,
    ) -> &mut Self {
        self.push(path, id, WriteKind::Update(changes, pre))
    }

    pub fn delete(&mut self, path: &CollectionPath, id: impl Into<String>, pre: Precondition) -> &mut Self {
        self.push(path, id, WriteKind::Delete(pre))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Distinct collections touched, in first-touch order.
    pub fn touched_paths(&self) -> Vec<CollectionPath> {
        let mut paths: Vec<CollectionPath> = Vec::new();
        for op in &self.ops {
            if !paths.contains(&op.path) {
                paths.push(op.path.clone());
            }
        }
        paths
    }
}

/// Outcome of one applied write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub path: CollectionPath,
    pub id: String,
    /// New version, or `None` when the document was deleted.
    pub version: Option<u64>,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitReceipt {
    pub results: Vec<WriteResult>,
}

impl CommitReceipt {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Published after every successful commit, once per touched collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: CollectionPath,
    pub ids: Vec<String>,
}

impl ChangeEvent {
    /// Groups a receipt's writes by collection.
    pub fn from_receipt(receipt: &CommitReceipt) -> Vec<ChangeEvent> {
        let mut events: Vec<ChangeEvent> = Vec::new();
        for result in &receipt.results {
            match events.iter_mut().find(|e| e.path == result.path) {
                Some(event) => event.ids.push(result.id.clone()),
                None => events.push(ChangeEvent {
                    path: result.path.clone(),
                    ids: vec![result.id.clone()],
                }),
            }
        }
        events
    }
}

// =============================================================================
// Applying Operations
// =============================================================================

/// Computes the document that results from applying `op` to `current`.
///
/// Returns `None` when the op deletes the document. Shared by both backends
/// so precondition and merge semantics cannot drift.
pub fn apply_op(op: &WriteOp, current: Option<&Document>, now: DateTime<Utc>) -> StoreResult<Option<Document>> {
    let collection = op.path.key();

    let check = |pre: &Precondition| -> StoreResult<()> {
        match (pre, current) {
            (Precondition::None, _) => Ok(()),
            (Precondition::Exists, Some(_)) => Ok(()),
            (Precondition::Exists, None) => Err(StoreError::not_found(&collection, &op.id)),
            (Precondition::Version(v), Some(doc)) if doc.version == *v => Ok(()),
            (Precondition::Version(v), actual) => Err(StoreError::Conflict {
                collection: collection.clone(),
                id: op.id.clone(),
                expected: *v,
                actual: actual.map(|d| d.version),
            }),
        }
    };

    let next = |data: Value| -> Document {
        match current {
            Some(doc) => Document {
                id: op.id.clone(),
                version: doc.version + 1,
                data,
                created_at: doc.created_at,
                updated_at: now,
            },
            None => Document {
                id: op.id.clone(),
                version: 1,
                data,
                created_at: now,
                updated_at: now,
            },
        }
    };

    match &op.kind {
        WriteKind::Create(data) => {
            if current.is_some() {
                return Err(StoreError::already_exists(&collection, &op.id));
            }
            Ok(Some(next(data.clone())))
        }
        WriteKind::Set(data, pre) => {
            check(pre)?;
            Ok(Some(next(data.clone())))
        }
        WriteKind::Merge(patch) => {
            let mut data = current.map(|d| d.data.clone()).unwrap_or_else(|| Value::Object(Map::new()));
            deep_merge(&mut data, patch);
            Ok(Some(next(data)))
        }
        WriteKind::Update(changes, pre) => {
            let Some(doc) = current else {
                return Err(StoreError::not_found(&collection, &op.id));
            };
            check(pre)?;
            let mut data = doc.data.clone();
            for change in changes {
                apply_field_change(&mut data, change)?;
            }
            Ok(Some(next(data)))
        }
        WriteKind::Delete(pre) => {
            check(pre)?;
            Ok(None)
        }
    }
}

/// Recursively merges `patch` into `target`. Non-object values overwrite.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                let nested = value.is_object() && target_map.get(key).is_some_and(Value::is_object);
                match target_map.get_mut(key) {
                    Some(existing) if nested => deep_merge(existing, value),
                    _ => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn apply_field_change(data: &mut Value, change: &FieldChange) -> StoreResult<()> {
    let (path, value) = match change {
        FieldChange::Set(path, value) => (path, Some(value)),
        FieldChange::Delete(path) => (path, None),
    };

    let Some((last, parents)) = path.segments().split_last() else {
        return Err(StoreError::InvalidWrite("empty field path".to_string()));
    };

    let mut cursor = data;
    for segment in parents {
        let Value::Object(map) = cursor else {
            return Err(StoreError::InvalidWrite(format!("{} is not an object", path)));
        };
        cursor = match value {
            Some(_) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            None => match map.get_mut(segment) {
                Some(child) => child,
                None => return Ok(()),
            },
        };
    }

    let Value::Object(map) = cursor else {
        return Err(StoreError::InvalidWrite(format!("{} is not an object", path)));
    };
    match value {
        Some(value) => {
            map.insert(last.clone(), value.clone());
        }
        None => {
            map.remove(last);
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
