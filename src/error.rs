// Error taxonomy
//
// Store-level failures (`StoreError`) are what an entity store backend can
// report; crate-level failures (`Error`) are what the service surfaces to
// callers. Referential gaps are deliberately absent: a transaction whose
// reference no longer resolves joins to an unknown placeholder and is only
// logged, never raised.

use thiserror::Error;

use crate::entities::EntityKind;

/// Failure modes surfaced by an entity store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or returned an internal error.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The record exists but belongs to a different user.
    #[error("not authorized to access records of user {user_id}")]
    Unauthorized { user_id: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// A write was rejected by the store's own validation, e.g. a delete
    /// blocked by a referencing transaction or a create pointing at a
    /// nonexistent entity.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// Crate-level error surfaced by the service operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input, rejected before any retrieval.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A retrieval needed for one report kind failed. Reported per kind;
    /// the other kind of a combined report proceeds independently.
    #[error("retrieval of {kind} records failed")]
    Retrieval {
        kind: EntityKind,
        #[source]
        source: StoreError,
    },

    /// The deletion guard found referencing transactions; the store was
    /// never asked to delete.
    #[error("cannot delete {kind} {id}: transactions still reference it")]
    DeletionBlocked { kind: EntityKind, id: String },

    /// The guard passed but the store refused the delete because a
    /// referencing transaction appeared concurrently. Not retried.
    #[error("delete of {kind} {id} failed: a referencing transaction was created concurrently")]
    ConcurrentDeletionRace { kind: EntityKind, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn retrieval(kind: EntityKind, source: StoreError) -> Self {
        Error::Retrieval { kind, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_error_names_the_kind() {
        let err = Error::retrieval(
            EntityKind::PartyTransaction,
            StoreError::Unavailable("connection refused".to_string()),
        );
        assert_eq!(err.to_string(), "retrieval of party transaction records failed");
    }

    #[test]
    fn test_store_error_converts() {
        let err: Error = StoreError::NotFound {
            kind: EntityKind::Party,
            id: "p-1".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Store(StoreError::NotFound { .. })));
    }
}
