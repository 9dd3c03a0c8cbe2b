//! Kind-tagged signer records, used where callers list signers without
//! knowing the binding kind up front.

use serde::Serialize;

use super::binding::ApplyTo;
use super::corporation::{CorporationSigning, CorporationSigningFilter};
use super::individual::{IndividualSigning, IndividualSigningFilter};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignerRecord {
    Individual(IndividualSigning),
    Corporation(CorporationSigning),
}

#[derive(Debug, Clone)]
pub enum SignerFilter {
    Individual(IndividualSigningFilter),
    Corporation(CorporationSigningFilter),
}

impl SignerFilter {
    pub fn kind(&self) -> ApplyTo {
        match self {
            SignerFilter::Individual(_) => ApplyTo::Individual,
            SignerFilter::Corporation(_) => ApplyTo::Corporation,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn individual(email: &str, corp_id: &str, enabled: bool) -> IndividualSigning {
        IndividualSigning {
            email: email.into(),
            name: "n".into(),
            corp_id: corp_id.into(),
            enabled,
            signed_at: Utc::now(),
            info: serde_json::json!({}),
        }
    }

    #[test]
    fn individual_filter_matches_all_set_fields() {
        let s = individual("alice@acme.com", "acme.com", false);

        assert!(IndividualSigningFilter::default().matches(&s));
        assert!(
            IndividualSigningFilter {
                email: Some("ALICE@acme.com".into()),
                ..Default::default()
            }
            .matches(&s)
        );
        assert!(
            !IndividualSigningFilter {
                corp_id: Some("acme.com".into()),
                enabled: Some(true),
                ..Default::default()
            }
            .matches(&s)
        );
    }

    #[test]
    fn corporation_filter_checks_flags() {
        let s = CorporationSigning {
            corp_id: "acme.com".into(),
            admin_email: "admin@acme.com".into(),
            admin_name: "Admin".into(),
            corporation_name: "ACME".into(),
            signed_at: Utc::now(),
            info: serde_json::json!({}),
            pdf_uploaded: false,
            admin_added: true,
        };

        assert!(
            CorporationSigningFilter {
                admin_added: Some(true),
                ..Default::default()
            }
            .matches(&s)
        );
        assert!(
            !CorporationSigningFilter {
                pdf_uploaded: Some(true),
                ..Default::default()
            }
            .matches(&s)
        );
    }

    #[test]
    fn signer_filter_reports_kind() {
        assert_eq!(
            SignerFilter::Individual(Default::default()).kind(),
            ApplyTo::Individual
        );
        assert_eq!(
            SignerFilter::Corporation(Default::default()).kind(),
            ApplyTo::Corporation
        );
    }
}
