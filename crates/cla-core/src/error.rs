//! Error types for the CLA signing system.

use thiserror::Error;

/// Infrastructure failures of the document store.
///
/// These are the only errors that are safe to retry blindly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("store operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("write conflict not resolved after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("store failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ClaError {
    #[error("no CLA binding found for {scope}")]
    NoBindingFound { scope: String },

    #[error("has not signed the CLA bound to {scope}")]
    HasNotSigned { scope: String },

    #[error("already signed")]
    AlreadySigned,

    #[error("signing is not completed: the corporation has not been enabled")]
    SigningUncompleted,

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("the signing PDF has not been uploaded yet")]
    PdfNotUploaded,

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("the email does not belong to the same corporation")]
    NotSameCorporation,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

pub type ClaResult<T> = Result<T, ClaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(ClaError::from(StorageError::Timeout {
            operation: "get_binding".into()
        })
        .is_retryable());
        assert!(ClaError::from(StorageError::Conflict { attempts: 3 }).is_retryable());
        assert!(!ClaError::AlreadySigned.is_retryable());
        assert!(!ClaError::not_found("cla_binding", "x").is_retryable());
        assert!(!ClaError::PdfNotUploaded.is_retryable());
    }
}
