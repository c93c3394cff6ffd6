use std::fmt;

use shelf_db::{IdError, RecordId, StoreError, TenantId};
use thiserror::Error;

use crate::domain::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Book,
    Collection,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Book => "book",
            RecordKind::Collection => "collection",
        })
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("a collection named '{0}' already exists")]
    DuplicateName(String),

    #[error("collection {0} is the only collection and cannot be deleted")]
    LastCollection(RecordId),

    #[error("database '{0}' already exists")]
    DatabaseExists(TenantId),

    /// Books were moved off the collection but the sequence stopped before
    /// the collection was removed. Every book still points at a live
    /// collection.
    #[error(
        "moved {reassigned} book(s) from collection {collection_id} to {target}, \
         but the collection was not deleted: {source}"
    )]
    IncompleteCollectionDelete {
        collection_id: RecordId,
        target: RecordId,
        reassigned: usize,
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A detached operation panicked or was aborted.
    #[error("operation did not finish: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

impl RepositoryError {
    pub(crate) fn not_found(kind: RecordKind, id: RecordId) -> Self {
        Self::NotFound { kind, id }
    }

    pub(crate) fn field(field: &'static str, error: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError {
            field,
            error: error.into(),
        }])
    }
}

impl From<Vec<FieldError>> for RepositoryError {
    fn from(errors: Vec<FieldError>) -> Self {
        Self::Validation(errors)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_fields() {
        let error = RepositoryError::Validation(vec![
            FieldError {
                field: "title",
                error: "is required".into(),
            },
            FieldError {
                field: "rating",
                error: "must be between 0 and 5".into(),
            },
        ]);
        assert_eq!(
            error.to_string(),
            "invalid input: title: is required, rating: must be between 0 and 5"
        );
    }

    #[test]
    fn incomplete_delete_keeps_store_cause() {
        use std::error::Error as _;

        let error = RepositoryError::IncompleteCollectionDelete {
            collection_id: RecordId::new(),
            target: RecordId::new(),
            reassigned: 2,
            source: StoreError::Unavailable("socket closed".into()),
        };
        assert!(error.to_string().contains("moved 2 book(s)"));
        assert!(error.source().is_some());
    }
}
