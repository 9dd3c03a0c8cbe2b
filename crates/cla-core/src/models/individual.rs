//! Individual signing record, embedded in a binding.
//!
//! Employees of a corporation sign through the same record type; their
//! record starts disabled until a corporation manager activates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndividualSigning {
    /// Lower-cased signer email, unique within a binding.
    pub email: String,
    pub name: String,
    /// Domain of the email; links an employee to its corporation.
    pub corp_id: String,
    pub enabled: bool,
    pub signed_at: DateTime<Utc>,
    /// Additional signing form fields.
    pub info: serde_json::Value,
}

/// Fields supplied by the signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndividualSigning {
    pub email: String,
    pub name: String,
    pub info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct IndividualSigningFilter {
    pub email: Option<String>,
    pub corp_id: Option<String>,
    pub enabled: Option<bool>,
}

impl IndividualSigningFilter {
    pub fn matches(&self, signing: &IndividualSigning) -> bool {
        self.email
            .as_deref()
            .is_none_or(|e| signing.email.eq_ignore_ascii_case(e.trim()))
            && self.corp_id.as_deref().is_none_or(|c| signing.corp_id == c)
            && self.enabled.is_none_or(|e| signing.enabled == e)
    }
}
