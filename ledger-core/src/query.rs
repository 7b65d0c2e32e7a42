//! Read-only views over recorded transactions
//!
//! Filtering happens at the storage layer (per-user index); sorting and
//! pagination happen here. Ties on the sort key break by transaction id so
//! pages are stable.

use crate::types::Transaction;
use serde::{Deserialize, Serialize};

/// Sort key for transaction listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    /// Recognition time (default)
    Timestamp,
    /// Recognized amount
    Amount,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending (default)
    Desc,
}

/// Parameters for a paginated transaction listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// Rows to skip before the page starts
    pub skip: usize,

    /// Page size; clamped to the configured maximum
    pub limit: usize,

    /// Sort key
    pub sort_by: SortBy,

    /// Sort direction
    pub order: SortOrder,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10,
            sort_by: SortBy::Timestamp,
            order: SortOrder::Desc,
        }
    }
}

/// Sort and paginate a user's transactions
///
/// Out-of-range `skip` yields an empty page, never an error.
pub fn paginate(
    mut transactions: Vec<Transaction>,
    query: &TransactionQuery,
    max_limit: usize,
) -> Vec<Transaction> {
    match query.sort_by {
        SortBy::Timestamp => {
            transactions.sort_by_key(|t| (t.timestamp_nanos, t.id));
        }
        SortBy::Amount => {
            transactions.sort_by(|a, b| a.amount.cmp(&b.amount).then(a.id.cmp(&b.id)));
        }
    }

    if query.order == SortOrder::Desc {
        transactions.reverse();
    }

    let limit = query.limit.min(max_limit);
    transactions.into_iter().skip(query.skip).take(limit).collect()
}
