//! Binding resolution.
//!
//! Given a platform/org/repo scope and a signer kind, decide which
//! binding governs. The store supplies the candidate bindings (see
//! [`BindingRepository::find_candidates`]); this module applies the
//! precedence rules:
//!
//! 1. In org-cared mode with a non-empty repo, a repo-specific binding
//!    with a qualifying signer wins immediately.
//! 2. If repo-specific bindings exist but none qualifies, resolution
//!    fails with [`ClaError::HasNotSigned`]. An org-wide signature never
//!    satisfies a repo that has its own CLA.
//! 3. Otherwise the first candidate, in creation order, with a qualifying
//!    signer wins.
//!
//! [`BindingRepository::find_candidates`]: crate::repository::BindingRepository::find_candidates

use crate::email;
use crate::error::{ClaError, ClaResult};
use crate::models::binding::{ApplyTo, Binding, BindingScope};

/// What to resolve.
#[derive(Debug, Clone)]
pub struct ResolutionQuery {
    pub scope: BindingScope,
    pub apply_to: ApplyTo,
    /// Also consider org-wide bindings as a fallback for `scope.repo_id`.
    pub org_cared: bool,
    /// Restrict qualifying records to this signer. For corporations the
    /// email is reduced to its corporation identity key.
    pub signer_email: Option<String>,
}

impl ResolutionQuery {
    /// Match bindings of exactly this scope.
    pub fn exact(scope: BindingScope, apply_to: ApplyTo) -> Self {
        Self {
            scope,
            apply_to,
            org_cared: false,
            signer_email: None,
        }
    }

    /// Match repo-specific bindings, falling back to org-wide ones.
    pub fn org_cared(scope: BindingScope, apply_to: ApplyTo) -> Self {
        Self {
            org_cared: true,
            ..Self::exact(scope, apply_to)
        }
    }

    pub fn with_signer(mut self, email: impl Into<String>) -> Self {
        self.signer_email = Some(email.into());
        self
    }

    /// Whether org-wide (`repo_id == ""`) bindings are candidates too.
    pub fn includes_org_wide(&self) -> bool {
        self.org_cared && !self.scope.repo_id.is_empty()
    }

    /// The `repo_id` values a candidate may carry.
    pub fn candidate_repos(&self) -> Vec<String> {
        if self.includes_org_wide() {
            vec![String::new(), self.scope.repo_id.clone()]
        } else {
            vec![self.scope.repo_id.clone()]
        }
    }

    fn accepts(&self, binding: &Binding) -> bool {
        binding.enabled
            && binding.apply_to == self.apply_to
            && binding.platform == self.scope.platform
            && binding.org_id == self.scope.org_id
            && (binding.repo_id == self.scope.repo_id
                || (self.includes_org_wide() && binding.is_org_wide()))
    }
}

/// Signer identity reduced to what a record is matched on.
enum SignerKey {
    Any,
    Email(String),
    Corporation(String),
}

impl SignerKey {
    fn from_query(query: &ResolutionQuery) -> ClaResult<Self> {
        match (&query.signer_email, query.apply_to) {
            (None, _) => Ok(SignerKey::Any),
            (Some(address), ApplyTo::Individual) => {
                Ok(SignerKey::Email(email::normalize(address)))
            }
            (Some(address), ApplyTo::Corporation) => {
                Ok(SignerKey::Corporation(email::corp_identity_key(address)?))
            }
        }
    }

    fn qualifies(&self, binding: &Binding, apply_to: ApplyTo) -> bool {
        match (self, apply_to) {
            (SignerKey::Any, ApplyTo::Individual) => !binding.individuals.is_empty(),
            (SignerKey::Any, ApplyTo::Corporation) => !binding.corporations.is_empty(),
            (SignerKey::Email(email), _) => binding.individual(email).is_some(),
            (SignerKey::Corporation(corp_id), _) => binding.corporation(corp_id).is_some(),
        }
    }
}

/// Pick the governing binding among `candidates`.
///
/// Candidates outside the query (disabled, other kind, other scope) are
/// ignored, so the store may over-fetch.
pub fn resolve<'a>(query: &ResolutionQuery, candidates: &'a [Binding]) -> ClaResult<&'a Binding> {
    let key = SignerKey::from_query(query)?;
    let candidates: Vec<&Binding> = candidates.iter().filter(|b| query.accepts(b)).collect();

    if candidates.is_empty() {
        return Err(ClaError::NoBindingFound {
            scope: query.scope.to_string(),
        });
    }

    let not_signed = || ClaError::HasNotSigned {
        scope: query.scope.to_string(),
    };

    if query.includes_org_wide() {
        let mut repo_claimed = false;
        for binding in candidates
            .iter()
            .copied()
            .filter(|b| b.repo_id == query.scope.repo_id)
        {
            repo_claimed = true;
            if key.qualifies(binding, query.apply_to) {
                return Ok(binding);
            }
        }
        if repo_claimed {
            return Err(not_signed());
        }
    }

    candidates
        .into_iter()
        .find(|b| key.qualifies(b, query.apply_to))
        .ok_or_else(not_signed)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::corporation::CorporationSigning;
    use crate::models::individual::IndividualSigning;

    fn binding(repo_id: &str, apply_to: ApplyTo) -> Binding {
        Binding {
            id: Uuid::new_v4(),
            platform: "github".into(),
            org_id: "acme".into(),
            repo_id: repo_id.into(),
            apply_to,
            cla_id: "cla-1".into(),
            cla_language: "english".into(),
            org_email: "cla@acme.org".into(),
            submitter: "owner".into(),
            enabled: true,
            org_signature_uploaded: false,
            individuals: Vec::new(),
            corporations: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn with_individual(mut b: Binding, address: &str) -> Binding {
        b.individuals.push(IndividualSigning {
            email: address.into(),
            name: "Signer".into(),
            corp_id: email::corp_identity_key(address).unwrap(),
            enabled: true,
            signed_at: Utc::now(),
            info: serde_json::json!({}),
        });
        b
    }

    fn with_corporation(mut b: Binding, admin_email: &str) -> Binding {
        b.corporations.push(CorporationSigning {
            corp_id: email::corp_identity_key(admin_email).unwrap(),
            admin_email: admin_email.into(),
            admin_name: "Admin".into(),
            corporation_name: "Corp".into(),
            signed_at: Utc::now(),
            info: serde_json::json!({}),
            pdf_uploaded: false,
            admin_added: false,
        });
        b
    }

    fn scope(repo: &str) -> BindingScope {
        BindingScope::new("github", "acme", repo)
    }

    #[test]
    fn no_candidates_is_no_binding_found() {
        let query = ResolutionQuery::org_cared(scope("widgets"), ApplyTo::Individual);
        assert!(matches!(
            resolve(&query, &[]),
            Err(ClaError::NoBindingFound { .. })
        ));
    }

    #[test]
    fn disabled_or_other_kind_candidates_are_ignored() {
        let mut disabled = with_individual(binding("", ApplyTo::Individual), "a@x.com");
        disabled.enabled = false;
        let corp = with_corporation(binding("", ApplyTo::Corporation), "admin@x.com");

        let query = ResolutionQuery::org_cared(scope("widgets"), ApplyTo::Individual);
        assert!(matches!(
            resolve(&query, &[disabled, corp]),
            Err(ClaError::NoBindingFound { .. })
        ));
    }

    #[test]
    fn empty_candidates_are_has_not_signed() {
        let candidates = [binding("", ApplyTo::Individual)];
        let query = ResolutionQuery::org_cared(scope("widgets"), ApplyTo::Individual);
        assert!(matches!(
            resolve(&query, &candidates),
            Err(ClaError::HasNotSigned { .. })
        ));
    }

    #[test]
    fn repo_binding_with_signer_wins_over_org_wide() {
        let org = with_individual(binding("", ApplyTo::Individual), "a@x.com");
        let repo = with_individual(binding("widgets", ApplyTo::Individual), "a@x.com");
        let candidates = [org, repo.clone()];

        let query = ResolutionQuery::org_cared(scope("widgets"), ApplyTo::Individual)
            .with_signer("a@x.com");
        assert_eq!(resolve(&query, &candidates).unwrap().id, repo.id);
    }

    #[test]
    fn unsatisfied_repo_binding_claims_precedence() {
        let org = with_corporation(binding("", ApplyTo::Corporation), "admin@corp.com");
        let repo = binding("widgets", ApplyTo::Corporation);
        let candidates = [org, repo];

        let query = ResolutionQuery::org_cared(scope("widgets"), ApplyTo::Corporation)
            .with_signer("someone@corp.com");
        assert!(matches!(
            resolve(&query, &candidates),
            Err(ClaError::HasNotSigned { .. })
        ));
    }

    #[test]
    fn org_wide_fallback_when_no_repo_binding() {
        let other_repo = with_individual(binding("gadgets", ApplyTo::Individual), "a@x.com");
        let org = with_individual(binding("", ApplyTo::Individual), "a@x.com");
        let candidates = [other_repo, org.clone()];

        let query = ResolutionQuery::org_cared(scope("widgets"), ApplyTo::Individual)
            .with_signer("A@X.com");
        assert_eq!(resolve(&query, &candidates).unwrap().id, org.id);
    }

    #[test]
    fn exact_mode_never_falls_back_to_org_wide() {
        let org = with_individual(binding("", ApplyTo::Individual), "a@x.com");
        let query = ResolutionQuery::exact(scope("widgets"), ApplyTo::Individual);
        assert!(matches!(
            resolve(&query, &[org]),
            Err(ClaError::NoBindingFound { .. })
        ));
    }

    #[test]
    fn first_qualifying_candidate_in_order_wins() {
        let first = binding("", ApplyTo::Corporation);
        let second = with_corporation(binding("", ApplyTo::Corporation), "admin@corp.com");
        let third = with_corporation(binding("", ApplyTo::Corporation), "admin@corp.com");
        let candidates = [first, second.clone(), third];

        let query = ResolutionQuery::exact(scope(""), ApplyTo::Corporation);
        assert_eq!(resolve(&query, &candidates).unwrap().id, second.id);
    }

    #[test]
    fn corporation_signer_matches_on_domain() {
        let org = with_corporation(binding("", ApplyTo::Corporation), "admin@corp.com");
        let candidates = [org.clone()];

        let hit = ResolutionQuery::exact(scope(""), ApplyTo::Corporation)
            .with_signer("employee@CORP.com");
        assert_eq!(resolve(&hit, &candidates).unwrap().id, org.id);

        let miss = ResolutionQuery::exact(scope(""), ApplyTo::Corporation)
            .with_signer("employee@other.com");
        assert!(matches!(
            resolve(&miss, &candidates),
            Err(ClaError::HasNotSigned { .. })
        ));
    }

    #[test]
    fn malformed_signer_email_is_invalid() {
        let query = ResolutionQuery::exact(scope(""), ApplyTo::Corporation).with_signer("nope");
        assert!(matches!(
            resolve(&query, &[]),
            Err(ClaError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn candidate_repos_follow_mode() {
        let exact = ResolutionQuery::exact(scope("widgets"), ApplyTo::Individual);
        assert_eq!(exact.candidate_repos(), vec!["widgets".to_string()]);

        let cared = ResolutionQuery::org_cared(scope("widgets"), ApplyTo::Individual);
        assert_eq!(
            cared.candidate_repos(),
            vec![String::new(), "widgets".to_string()]
        );

        let org_only = ResolutionQuery::org_cared(scope(""), ApplyTo::Individual);
        assert_eq!(org_only.candidate_repos(), vec![String::new()]);
    }
}
