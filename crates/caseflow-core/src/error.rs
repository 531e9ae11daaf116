//! Error taxonomy for engine operations.

use caseflow_store::StoreError;

/// Typed failures returned by every engine operation.
///
/// `Transient` is the only retryable kind: the engine retries it itself a
/// bounded number of times before surfacing it; all other kinds are
/// returned to the caller immediately and never retried.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Referenced case, escalation, or assignment is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would violate an invariant (duplicate active
    /// assignment, duplicate pending escalation, double closure).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor lacks an active relationship to the case, or requested a
    /// status outside its allow-list.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A required field is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Store timeout or serialization conflict; safe to retry the whole
    /// operation.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::VersionConflict { .. }
            | StoreError::DuplicateRecord(_)
            | StoreError::Timeout { .. }
            | StoreError::Unavailable(_) => EngineError::Transient(err.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_maps_to_transient() {
        let err: EngineError = StoreError::VersionConflict {
            record: "case x".into(),
            expected: 1,
            found: 2,
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_not_found_is_not_retryable() {
        let err: EngineError = StoreError::NotFound("case x".into()).into();
        assert!(!err.is_transient());
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
