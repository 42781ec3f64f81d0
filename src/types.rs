//! Core identifier newtypes and the store-facing error type.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a stored entity row.
///
/// Ids are opaque to the query core; the backing store assigns them. They are
/// compared for equality and order only.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId(value)
    }
}

impl From<EntityId> for u64 {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

/// Errors surfaced by a store backend while answering a query.
///
/// The query core never retries a store call; a failure propagates to the
/// caller as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("entity not found")]
    NotFound,
    /// A predicate asked the backend for an operation it cannot answer.
    #[error("unsupported store operation: {0}")]
    Unsupported(&'static str),
    /// A row held a value whose type does not match the entity model.
    #[error("malformed row {id}: {reason}")]
    MalformedRow {
        /// Offending row id.
        id: EntityId,
        /// Human-readable description of the mismatch.
        reason: &'static str,
    },
}

/// Convenience alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
