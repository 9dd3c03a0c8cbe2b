//! Row and document shapes for the `cla_binding` table.
//!
//! Signing records are embedded as arrays of objects. They are read back
//! as JSON and decoded with serde, since their layout is owned here and
//! not by the domain types.

use chrono::{DateTime, Utc};
use cla_core::models::binding::{ApplyTo, Binding};
use cla_core::models::corporation::CorporationSigning;
use cla_core::models::individual::IndividualSigning;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

pub(crate) const BINDING_TABLE: &str = "cla_binding";

pub(crate) fn parse_apply_to(s: &str) -> Result<ApplyTo, DbError> {
    match s {
        "Individual" => Ok(ApplyTo::Individual),
        "Corporation" => Ok(ApplyTo::Corporation),
        other => Err(DbError::Decode(format!("unknown apply_to: {other}"))),
    }
}

pub(crate) fn apply_to_str(apply_to: ApplyTo) -> &'static str {
    match apply_to {
        ApplyTo::Individual => "Individual",
        ApplyTo::Corporation => "Corporation",
    }
}

pub(crate) fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Stored shape of an individual signing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndividualSigningDoc {
    pub email: String,
    pub name: String,
    pub corp_id: String,
    pub enabled: bool,
    pub signed_at: DateTime<Utc>,
    #[serde(default = "empty_object")]
    pub info: Value,
}

impl From<&IndividualSigning> for IndividualSigningDoc {
    fn from(s: &IndividualSigning) -> Self {
        Self {
            email: s.email.clone(),
            name: s.name.clone(),
            corp_id: s.corp_id.clone(),
            enabled: s.enabled,
            signed_at: s.signed_at,
            info: s.info.clone(),
        }
    }
}

impl From<IndividualSigningDoc> for IndividualSigning {
    fn from(d: IndividualSigningDoc) -> Self {
        Self {
            email: d.email,
            name: d.name,
            corp_id: d.corp_id,
            enabled: d.enabled,
            signed_at: d.signed_at,
            info: d.info,
        }
    }
}

/// Stored shape of a corporation signing record. `pdf` holds the signed
/// document, base64-encoded, and never leaves this crate through
/// [`CorporationSigning`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CorporationSigningDoc {
    pub corp_id: String,
    pub admin_email: String,
    pub admin_name: String,
    pub corp_name: String,
    pub signed_at: DateTime<Utc>,
    #[serde(default = "empty_object")]
    pub info: Value,
    #[serde(default)]
    pub pdf_uploaded: bool,
    #[serde(default)]
    pub admin_added: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
}

impl From<&CorporationSigning> for CorporationSigningDoc {
    fn from(s: &CorporationSigning) -> Self {
        Self {
            corp_id: s.corp_id.clone(),
            admin_email: s.admin_email.clone(),
            admin_name: s.admin_name.clone(),
            corp_name: s.corporation_name.clone(),
            signed_at: s.signed_at,
            info: s.info.clone(),
            pdf_uploaded: s.pdf_uploaded,
            admin_added: s.admin_added,
            pdf: None,
        }
    }
}

impl CorporationSigningDoc {
    fn into_parts(self) -> (CorporationSigning, Option<String>) {
        let signing = CorporationSigning {
            corp_id: self.corp_id,
            admin_email: self.admin_email,
            admin_name: self.admin_name,
            corporation_name: self.corp_name,
            signed_at: self.signed_at,
            info: self.info,
            pdf_uploaded: self.pdf_uploaded,
            admin_added: self.admin_added,
        };
        (signing, self.pdf)
    }
}

fn decode_array<T: serde::de::DeserializeOwned>(value: Value, field: &str) -> Result<Vec<T>, DbError> {
    match value {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other)
            .map_err(|e| DbError::Decode(format!("invalid {field}: {e}"))),
    }
}

/// Timestamps returned by a `CREATE`.
#[derive(Debug, SurrealValue)]
pub(crate) struct CreatedRow {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Revision returned by a guarded ledger `UPDATE`.
#[derive(Debug, SurrealValue)]
pub(crate) struct VersionRow {
    pub version: u64,
}

/// A binding selected with `meta::id(id) AS record_id, *`.
#[derive(Debug, SurrealValue)]
pub(crate) struct BindingRow {
    record_id: String,
    platform: String,
    org_id: String,
    repo_id: String,
    apply_to: String,
    cla_id: String,
    cla_language: String,
    org_email: String,
    submitter: String,
    enabled: bool,
    org_signature_uploaded: bool,
    individuals: Value,
    corporations: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A decoded binding plus the storage-only state the ledger needs.
#[derive(Debug)]
pub(crate) struct StoredBinding {
    pub binding: Binding,
    /// Base64 PDFs, parallel to `binding.corporations`.
    pub corporation_pdfs: Vec<Option<String>>,
}

impl BindingRow {
    pub(crate) fn decode(self) -> Result<StoredBinding, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;

        let individuals: Vec<IndividualSigningDoc> =
            decode_array(self.individuals, "individuals")?;
        let corporations: Vec<CorporationSigningDoc> =
            decode_array(self.corporations, "corporations")?;
        let (corporations, corporation_pdfs) =
            corporations.into_iter().map(CorporationSigningDoc::into_parts).unzip();

        let binding = Binding {
            id,
            platform: self.platform,
            org_id: self.org_id,
            repo_id: self.repo_id,
            apply_to: parse_apply_to(&self.apply_to)?,
            cla_id: self.cla_id,
            cla_language: self.cla_language,
            org_email: self.org_email,
            submitter: self.submitter,
            enabled: self.enabled,
            org_signature_uploaded: self.org_signature_uploaded,
            individuals: individuals.into_iter().map(Into::into).collect(),
            corporations,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        Ok(StoredBinding {
            binding,
            corporation_pdfs,
        })
    }

    pub(crate) fn into_binding(self) -> Result<Binding, DbError> {
        self.decode().map(|stored| stored.binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corporation_doc_keeps_pdf_out_of_domain_record() {
        let doc: CorporationSigningDoc = serde_json::from_value(serde_json::json!({
            "corp_id": "corp.com",
            "admin_email": "admin@corp.com",
            "admin_name": "Admin",
            "corp_name": "Corp",
            "signed_at": "2024-05-01T10:00:00Z",
            "pdf_uploaded": true,
            "pdf": "JVBERg==",
        }))
        .unwrap();

        let (signing, pdf) = doc.into_parts();
        assert_eq!(signing.corporation_name, "Corp");
        assert!(signing.pdf_uploaded);
        assert!(!signing.admin_added);
        assert_eq!(signing.info, empty_object());
        assert_eq!(pdf.as_deref(), Some("JVBERg=="));
    }

    #[test]
    fn new_corporation_doc_has_no_pdf_key() {
        let signing = CorporationSigning {
            corp_id: "corp.com".into(),
            admin_email: "admin@corp.com".into(),
            admin_name: "Admin".into(),
            corporation_name: "Corp".into(),
            signed_at: Utc::now(),
            info: empty_object(),
            pdf_uploaded: false,
            admin_added: false,
        };
        let value = serde_json::to_value(CorporationSigningDoc::from(&signing)).unwrap();
        assert!(value.get("pdf").is_none());
        assert_eq!(value["corp_name"], "Corp");
    }

    #[test]
    fn null_arrays_decode_as_empty() {
        let docs: Vec<IndividualSigningDoc> = decode_array(Value::Null, "individuals").unwrap();
        assert!(docs.is_empty());
    }
}
