//! Signing error types.

use cla_core::error::ClaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("the corporation has not been enabled")]
    CorporationNotActivated,

    #[error("not the same corporation")]
    NotSameCorporation,

    #[error("bindings {0} and {1} do not cover the same repository")]
    ScopeMismatch(String, String),

    #[error("binding governs {expected} signers")]
    KindMismatch { expected: String },

    #[error("the corporation administrator cannot be removed")]
    AdminNotRemovable,
}

impl From<SigningError> for ClaError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::CorporationNotActivated => ClaError::SigningUncompleted,
            SigningError::NotSameCorporation => ClaError::NotSameCorporation,
            SigningError::ScopeMismatch(..)
            | SigningError::KindMismatch { .. }
            | SigningError::AdminNotRemovable => ClaError::InvalidParameter {
                message: err.to_string(),
            },
        }
    }
}
