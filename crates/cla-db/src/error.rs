//! Database-specific error types and conversions.

use cla_core::error::{ClaError, StorageError};

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },
}

impl DbError {
    pub(crate) fn query(err: impl std::fmt::Display) -> Self {
        DbError::Query(err.to_string())
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        DbError::Decode(err.to_string())
    }

    /// Whether the store rejected the write because a concurrent
    /// transaction touched the same record. Such writes can be retried.
    pub fn is_conflict(&self) -> bool {
        let message = match self {
            DbError::Surreal(e) => e.to_string(),
            DbError::Query(msg) => msg.clone(),
            _ => return false,
        };
        let message = message.to_ascii_lowercase();
        message.contains("conflict") || message.contains("can be retried")
    }

    /// Whether a unique index rejected the write.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::Query(msg) if msg.contains("already contains"))
    }
}

impl From<DbError> for ClaError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ClaError::NotFound { entity, id },
            DbError::Timeout { operation } => StorageError::Timeout { operation }.into(),
            ref e if e.is_conflict() => StorageError::Conflict { attempts: 1 }.into(),
            other => StorageError::Backend(other.to_string()).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_detected_from_messages() {
        let err = DbError::Query(
            "Failed to commit transaction due to a read or write conflict. \
             This transaction can be retried"
                .into(),
        );
        assert!(err.is_conflict());
        assert!(!DbError::Query("Parse error".into()).is_conflict());
        assert!(!DbError::Decode("conflict".into()).is_conflict());
    }

    #[test]
    fn conversion_keeps_semantic_kinds() {
        let err: ClaError = DbError::NotFound {
            entity: "cla_binding".into(),
            id: "x".into(),
        }
        .into();
        assert!(matches!(err, ClaError::NotFound { .. }));

        let err: ClaError = DbError::Timeout {
            operation: "get_binding".into(),
        }
        .into();
        assert!(matches!(
            err,
            ClaError::Storage(StorageError::Timeout { .. })
        ));

        let err: ClaError = DbError::Decode("bad".into()).into();
        assert!(err.is_retryable());
    }
}
