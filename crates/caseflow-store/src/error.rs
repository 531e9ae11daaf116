//! Error types for the ledger store layer.

use thiserror::Error;

/// Errors surfaced by a [`crate::LedgerStore`] backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record referenced by an update write does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// An update write carried a stale version (concurrent modification).
    #[error("version conflict on {record}: expected {expected}, found {found}")]
    VersionConflict {
        record: String,
        expected: u64,
        found: u64,
    },

    /// An insert write collided with an existing record.
    #[error("duplicate record: {0}")]
    DuplicateRecord(String),

    /// A store call exceeded its deadline.
    #[error("store call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The backend is unreachable or failed internally.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
