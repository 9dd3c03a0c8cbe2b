//! Corporation signing record, embedded in a binding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A corporation's signature under one binding.
///
/// The signed PDF itself is never carried on this struct; it is fetched
/// separately through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorporationSigning {
    /// Identity key derived from the admin email domain.
    pub corp_id: String,
    pub admin_email: String,
    pub admin_name: String,
    pub corporation_name: String,
    pub signed_at: DateTime<Utc>,
    pub info: serde_json::Value,
    pub pdf_uploaded: bool,
    /// Set once the corporation administrator has been provisioned.
    /// Gates employee signing.
    pub admin_added: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCorporationSigning {
    pub admin_email: String,
    pub admin_name: String,
    pub corporation_name: String,
    pub info: Option<serde_json::Value>,
}

/// A targeted update on one corporation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorporationFlag {
    /// Transition `admin_added` from false to true.
    AdminAdded,
    /// Store the signed PDF and mark it uploaded.
    Pdf(Vec<u8>),
}

#[derive(Debug, Clone, Default)]
pub struct CorporationSigningFilter {
    pub corp_id: Option<String>,
    pub admin_added: Option<bool>,
    pub pdf_uploaded: Option<bool>,
}

impl CorporationSigningFilter {
    pub fn matches(&self, signing: &CorporationSigning) -> bool {
        self.corp_id.as_deref().is_none_or(|c| signing.corp_id == c)
            && self.admin_added.is_none_or(|a| signing.admin_added == a)
            && self.pdf_uploaded.is_none_or(|p| signing.pdf_uploaded == p)
    }
}
