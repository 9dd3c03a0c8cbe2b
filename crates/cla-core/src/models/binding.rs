//! Binding domain model.
//!
//! A binding associates a CLA template with an org (or a single repo of
//! that org) on a code-hosting platform. It is the aggregate root that
//! owns every signing record made against it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::corporation::CorporationSigning;
use super::individual::IndividualSigning;

/// The kind of signer a binding governs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ApplyTo {
    Individual,
    Corporation,
}

impl fmt::Display for ApplyTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyTo::Individual => f.write_str("individual"),
            ApplyTo::Corporation => f.write_str("corporation"),
        }
    }
}

/// The `(platform, org, repo)` key a binding is attached to.
///
/// An empty `repo_id` makes the binding org-wide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BindingScope {
    pub platform: String,
    pub org_id: String,
    pub repo_id: String,
}

impl BindingScope {
    pub fn new(
        platform: impl Into<String>,
        org_id: impl Into<String>,
        repo_id: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            org_id: org_id.into(),
            repo_id: repo_id.into(),
        }
    }

    pub fn is_org_wide(&self) -> bool {
        self.repo_id.is_empty()
    }
}

impl fmt::Display for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.platform, self.org_id, self.repo_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub id: Uuid,
    pub platform: String,
    pub org_id: String,
    /// Empty for org-wide bindings.
    pub repo_id: String,
    pub apply_to: ApplyTo,
    /// CLA template this binding refers to.
    pub cla_id: String,
    pub cla_language: String,
    /// Sender address of record for notifications.
    pub org_email: String,
    pub submitter: String,
    /// Disabled bindings are invisible to resolution and signing.
    pub enabled: bool,
    pub org_signature_uploaded: bool,
    /// Individual and employee signing records, in signing order.
    pub individuals: Vec<IndividualSigning>,
    /// Corporation signing records, in signing order.
    pub corporations: Vec<CorporationSigning>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Binding {
    pub fn scope(&self) -> BindingScope {
        BindingScope::new(&self.platform, &self.org_id, &self.repo_id)
    }

    pub fn is_org_wide(&self) -> bool {
        self.repo_id.is_empty()
    }

    pub fn individual(&self, email: &str) -> Option<&IndividualSigning> {
        self.individuals
            .iter()
            .find(|s| s.email.eq_ignore_ascii_case(email.trim()))
    }

    pub fn corporation(&self, corp_id: &str) -> Option<&CorporationSigning> {
        self.corporations.iter().find(|s| s.corp_id == corp_id)
    }
}

/// Fields required to create a new binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBinding {
    pub platform: String,
    pub org_id: String,
    pub repo_id: String,
    pub apply_to: ApplyTo,
    pub cla_id: String,
    pub cla_language: String,
    pub org_email: String,
    pub submitter: String,
}

/// Fields that can be updated on an existing binding.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBinding {
    pub enabled: Option<bool>,
    pub org_email: Option<String>,
    pub org_signature_uploaded: Option<bool>,
}

/// Query filters for listing bindings. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct BindingFilter {
    pub platform: Option<String>,
    pub org_id: Option<String>,
    pub repo_id: Option<String>,
    pub apply_to: Option<ApplyTo>,
    pub enabled: Option<bool>,
    pub cla_language: Option<String>,
}

impl BindingFilter {
    /// Filter matching every binding of exactly this scope.
    pub fn for_scope(scope: &BindingScope) -> Self {
        Self {
            platform: Some(scope.platform.clone()),
            org_id: Some(scope.org_id.clone()),
            repo_id: Some(scope.repo_id.clone()),
            ..Default::default()
        }
    }
}
