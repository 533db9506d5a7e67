//! # Query Model
//!
//! Filtered, ordered, limited reads over one collection.
//!
//! ## Evaluation Order
//! ```text
//! all documents in path
//!      │
//!      ▼
//! filters (AND)      isDeleted == false, nameKey == "amina", ...
//!      │             a document missing the field never matches
//!      ▼
//! order_by           field ASC/DESC, ties broken by id ASC
//!      │
//!      ▼
//! limit              first N
//! ```
//!
//! Both backends follow the same comparison rules: numbers compare
//! numerically, strings lexicographically, booleans as 0/1, and null or
//! missing values sort first.

use serde_json::Value;
use std::cmp::Ordering;

use crate::document::{CollectionPath, Document};

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl FilterOp {
    pub(crate) const fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
        }
    }
}

/// One condition on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// True when `doc` satisfies the condition.
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };
        if actual.is_null() || self.value.is_null() {
            return false;
        }
        let Some(ord) = compare_same_kind(actual, &self.value) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Lt => ord == Ordering::Less,
            FilterOp::Lte => ord != Ordering::Greater,
            FilterOp::Gt => ord == Ordering::Greater,
            FilterOp::Gte => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// A query over one collection.
///
/// ## Example
/// ```rust
/// use tally_core::StoreNamespace;
/// use tally_store::{CollectionPath, Query, SortDirection};
///
/// let ns = StoreNamespace::from_store_name("Mama Put").unwrap();
/// let query = Query::new(CollectionPath::items(&ns))
///     .where_eq("isDeleted", false)
///     .order_by("name", SortDirection::Ascending)
///     .limit(50);
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub path: CollectionPath,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(path: CollectionPath) -> Self {
        Query {
            path,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when every filter matches.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filters, sorts and truncates an unordered document set.
    ///
    /// Used by the in-memory backend.
    pub fn evaluate<'a, I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).cloned().collect();

        match &self.order {
            Some(order) => out.sort_by(|a, b| {
                let ord = compare_for_sort(a.field(&order.field), b.field(&order.field));
                let ord = match order.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                };
                ord.then_with(|| a.id.cmp(&b.id))
            }),
            None => out.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

// =============================================================================
// Value Comparison
// =============================================================================

/// Sort rank: null/missing, then numbers and booleans, then strings, then
/// arrays and objects.
fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) | Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(_) => 3,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Compares two values of the same kind; `None` for mismatched kinds.
fn compare_same_kind(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            if kind_rank(Some(a)) != 1 || kind_rank(Some(b)) != 1 {
                return None;
            }
            as_number(a)?.partial_cmp(&as_number(b)?)
        }
        _ => None,
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (kind_rank(a), kind_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(a), Some(b)) => compare_same_kind(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
