//! Signing service: binding administration, signing flows, resolution
//! queries and notification fan-out.
//!
//! The service owns the cross-record preconditions (employee signing
//! needs an activated corporation, managers only act on their own
//! corporation). Per-binding invariants are enforced by the ledger.
//! Notifications are sent after the write commits; a failed delivery is
//! logged and never undoes the write.

use cla_core::email;
use cla_core::error::{ClaError, ClaResult};
use cla_core::models::binding::{
    ApplyTo, Binding, BindingFilter, BindingScope, CreateBinding, UpdateBinding,
};
use cla_core::models::corporation::{
    CorporationFlag, CorporationSigning, CorporationSigningFilter, CreateCorporationSigning,
};
use cla_core::models::individual::{CreateIndividualSigning, IndividualSigning};
use cla_core::models::manager::{CorporationManager, CreateCorporationManager, ManagerRole};
use cla_core::models::signer::{SignerFilter, SignerRecord};
use cla_core::notification::{EmailMessage, Notification, NotificationSink};
use cla_core::repository::{BindingRepository, CorporationManagerRepository, SignerLedger};
use cla_core::resolution::{self, ResolutionQuery};
use rand::Rng;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SigningConfig;
use crate::error::SigningError;

/// A corporation manager acting on behalf of its corporation, as
/// identified by the caller's authentication layer.
#[derive(Debug, Clone)]
pub struct CorporationActor {
    /// The corporation binding the manager belongs to.
    pub binding_id: Uuid,
    pub email: String,
}

/// Corporation signings under one binding of a scope.
#[derive(Debug, Clone, Serialize)]
pub struct BindingSignings {
    pub binding_id: Uuid,
    pub cla_language: String,
    pub corporations: Vec<CorporationSigning>,
}

fn log_storage(operation: &'static str) -> impl Fn(&ClaError) {
    move |err: &ClaError| {
        if let ClaError::Storage(e) = err {
            error!(operation, error = %e, "Store operation failed");
        }
    }
}

fn ensure_signable(binding: &Binding, kind: ApplyTo) -> ClaResult<()> {
    if !binding.enabled {
        return Err(ClaError::not_found("cla_binding", binding.id));
    }
    if binding.apply_to != kind {
        return Err(SigningError::KindMismatch {
            expected: binding.apply_to.to_string(),
        }
        .into());
    }
    Ok(())
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length.max(1))
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// CLA signing service.
///
/// Generic over the repository traits so that it has no dependency on
/// the database crate.
pub struct SigningService<B, L, M, N>
where
    B: BindingRepository,
    L: SignerLedger,
    M: CorporationManagerRepository,
    N: NotificationSink,
{
    bindings: B,
    ledger: L,
    managers: M,
    notifier: N,
    config: SigningConfig,
}

impl<B, L, M, N> SigningService<B, L, M, N>
where
    B: BindingRepository,
    L: SignerLedger,
    M: CorporationManagerRepository,
    N: NotificationSink,
{
    pub fn new(bindings: B, ledger: L, managers: M, notifier: N, config: SigningConfig) -> Self {
        Self {
            bindings,
            ledger,
            managers,
            notifier,
            config,
        }
    }

    async fn notify(&self, from: &str, to: Vec<String>, notification: Notification) {
        if to.is_empty() {
            return;
        }
        let template = notification.template();
        let message = EmailMessage::new(from, to, notification);
        if let Err(e) = self.notifier.send(message).await {
            warn!(template, error = %e, "Failed to send notification");
        }
    }

    // -------------------------------------------------------------------
    // Bindings
    // -------------------------------------------------------------------

    pub async fn create_binding(&self, input: CreateBinding) -> ClaResult<Binding> {
        self.bindings
            .create(input)
            .await
            .inspect_err(log_storage("create_binding"))
    }

    pub async fn get_binding(&self, id: Uuid) -> ClaResult<Binding> {
        self.bindings
            .get_by_id(id)
            .await
            .inspect_err(log_storage("get_binding"))
    }

    pub async fn update_binding(&self, id: Uuid, input: UpdateBinding) -> ClaResult<Binding> {
        self.bindings
            .update(id, input)
            .await
            .inspect_err(log_storage("update_binding"))
    }

    /// Delete a binding with every signing record and manager under it.
    pub async fn delete_binding(&self, id: Uuid) -> ClaResult<()> {
        self.bindings
            .delete(id)
            .await
            .inspect_err(log_storage("delete_binding"))
    }

    pub async fn list_bindings(&self, filter: BindingFilter) -> ClaResult<Vec<Binding>> {
        self.bindings
            .list(filter)
            .await
            .inspect_err(log_storage("list_bindings"))
    }

    // -------------------------------------------------------------------
    // Signing
    // -------------------------------------------------------------------

    pub async fn sign_individual(
        &self,
        binding_id: Uuid,
        input: CreateIndividualSigning,
    ) -> ClaResult<IndividualSigning> {
        let binding = self.get_binding(binding_id).await?;
        ensure_signable(&binding, ApplyTo::Individual)?;

        let signing = self
            .ledger
            .append_individual(binding_id, input, true)
            .await
            .inspect_err(log_storage("sign_individual"))?;

        self.notify(
            &binding.org_email,
            vec![signing.email.clone()],
            Notification::IndividualSigned {
                name: signing.name.clone(),
            },
        )
        .await;
        Ok(signing)
    }

    pub async fn sign_corporation(
        &self,
        binding_id: Uuid,
        input: CreateCorporationSigning,
    ) -> ClaResult<CorporationSigning> {
        let binding = self.get_binding(binding_id).await?;
        ensure_signable(&binding, ApplyTo::Corporation)?;

        let signing = self
            .ledger
            .append_corporation(binding_id, input)
            .await
            .inspect_err(log_storage("sign_corporation"))?;

        self.notify(
            &binding.org_email,
            vec![signing.admin_email.clone()],
            Notification::CorporationSigned {
                corporation_name: signing.corporation_name.clone(),
                admin_name: signing.admin_name.clone(),
            },
        )
        .await;
        Ok(signing)
    }

    /// Record an employee signing under an individual binding.
    ///
    /// The employee's corporation must have signed a corporation binding
    /// of the same scope and have its administrator added. The record
    /// starts disabled until a manager activates it.
    pub async fn sign_employee(
        &self,
        binding_id: Uuid,
        input: CreateIndividualSigning,
    ) -> ClaResult<IndividualSigning> {
        let binding = self.get_binding(binding_id).await?;
        ensure_signable(&binding, ApplyTo::Individual)?;

        let corp_id = email::corp_identity_key(&input.email)?;
        let query = ResolutionQuery::exact(binding.scope(), ApplyTo::Corporation)
            .with_signer(input.email.clone());
        let candidates = self
            .bindings
            .find_candidates(&query)
            .await
            .inspect_err(log_storage("sign_employee"))?;
        let corp_binding = resolution::resolve(&query, &candidates)?;
        let corporation = corp_binding
            .corporation(&corp_id)
            .ok_or_else(|| ClaError::HasNotSigned {
                scope: binding.scope().to_string(),
            })?;
        if !corporation.admin_added {
            return Err(SigningError::CorporationNotActivated.into());
        }

        let signing = self
            .ledger
            .append_individual(binding_id, input, false)
            .await
            .inspect_err(log_storage("sign_employee"))?;

        let recipients = match self
            .managers
            .list(
                corp_binding.id,
                &corp_id,
                Some(self.config.employee_signing_recipients),
            )
            .await
        {
            Ok(managers) => managers.into_iter().map(|m| m.email).collect(),
            Err(e) => {
                warn!(corp_id = %corp_id, error = %e, "Failed to list corporation managers");
                Vec::new()
            }
        };
        self.notify(
            &binding.org_email,
            recipients,
            Notification::EmployeeSigned {
                employee_email: signing.email.clone(),
            },
        )
        .await;
        Ok(signing)
    }

    /// Mark the corporation administrator as added, register it as the
    /// corporation's `Admin` manager and tell it so.
    pub async fn set_admin_added(
        &self,
        binding_id: Uuid,
        corp_id: &str,
    ) -> ClaResult<CorporationManager> {
        self.ledger
            .set_corporation_flag(binding_id, corp_id, CorporationFlag::AdminAdded)
            .await
            .inspect_err(log_storage("set_admin_added"))?;

        let binding = self.get_binding(binding_id).await?;
        let corporation = binding
            .corporation(corp_id)
            .ok_or_else(|| ClaError::not_found("corporation_signing", corp_id))?;

        let admin = match self
            .managers
            .add(CreateCorporationManager {
                binding_id,
                email: corporation.admin_email.clone(),
                name: corporation.admin_name.clone(),
                role: ManagerRole::Admin,
            })
            .await
        {
            Ok(admin) => admin,
            Err(ClaError::AlreadyExists { .. }) => {
                self.managers
                    .get_by_email(binding_id, &corporation.admin_email)
                    .await?
            }
            Err(e) => {
                log_storage("set_admin_added")(&e);
                return Err(e);
            }
        };

        info!(binding_id = %binding_id, corp_id, "Corporation administrator added");
        self.notify(
            &binding.org_email,
            vec![admin.email.clone()],
            Notification::ManagerAdded { admin: true },
        )
        .await;
        Ok(admin)
    }

    pub async fn upload_pdf(&self, binding_id: Uuid, corp_id: &str, pdf: Vec<u8>) -> ClaResult<()> {
        self.ledger
            .set_corporation_flag(binding_id, corp_id, CorporationFlag::Pdf(pdf))
            .await
            .inspect_err(log_storage("upload_pdf"))
    }

    pub async fn download_pdf(&self, binding_id: Uuid, corp_id: &str) -> ClaResult<Vec<u8>> {
        self.ledger
            .get_pdf(binding_id, corp_id)
            .await
            .inspect_err(log_storage("download_pdf"))
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// The binding governing `query`, or why there is none.
    pub async fn resolve(&self, query: &ResolutionQuery) -> ClaResult<Binding> {
        let candidates = self
            .bindings
            .find_candidates(query)
            .await
            .inspect_err(log_storage("resolve"))?;
        resolution::resolve(query, &candidates).cloned()
    }

    /// Whether `signer_email` holds a signature of kind `apply_to` for the
    /// scope, with org-wide bindings as fallback.
    ///
    /// "Not signed" and "no binding" both answer `false`. A pending
    /// employee has not signed yet.
    pub async fn check_signed(
        &self,
        scope: BindingScope,
        apply_to: ApplyTo,
        signer_email: &str,
    ) -> ClaResult<bool> {
        let query = ResolutionQuery::org_cared(scope, apply_to).with_signer(signer_email);
        let binding = match self.resolve(&query).await {
            Ok(binding) => binding,
            Err(ClaError::HasNotSigned { .. } | ClaError::NoBindingFound { .. }) => {
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        Ok(match apply_to {
            ApplyTo::Individual => binding
                .individual(signer_email)
                .is_some_and(|s| s.enabled),
            ApplyTo::Corporation => true,
        })
    }

    pub async fn list_signers(
        &self,
        binding_id: Uuid,
        filter: SignerFilter,
    ) -> ClaResult<Vec<SignerRecord>> {
        let records = match filter {
            SignerFilter::Individual(filter) => self
                .ledger
                .list_individuals(binding_id, filter)
                .await
                .inspect_err(log_storage("list_signers"))?
                .into_iter()
                .map(SignerRecord::Individual)
                .collect(),
            SignerFilter::Corporation(filter) => self
                .ledger
                .list_corporations(binding_id, filter)
                .await
                .inspect_err(log_storage("list_signers"))?
                .into_iter()
                .map(SignerRecord::Corporation)
                .collect(),
        };
        Ok(records)
    }

    /// Corporation signings of every enabled corporation binding of
    /// exactly this scope, optionally restricted to one CLA language.
    pub async fn list_corporation_signings(
        &self,
        scope: &BindingScope,
        cla_language: Option<String>,
    ) -> ClaResult<Vec<BindingSignings>> {
        let bindings = self
            .list_bindings(BindingFilter {
                apply_to: Some(ApplyTo::Corporation),
                enabled: Some(true),
                cla_language,
                ..BindingFilter::for_scope(scope)
            })
            .await?;

        let filter = CorporationSigningFilter::default();
        Ok(bindings
            .into_iter()
            .map(|b| BindingSignings {
                binding_id: b.id,
                cla_language: b.cla_language,
                corporations: b
                    .corporations
                    .into_iter()
                    .filter(|c| filter.matches(c))
                    .collect(),
            })
            .collect())
    }

    // -------------------------------------------------------------------
    // Employees and managers
    // -------------------------------------------------------------------

    /// Check that `actor` may act on `employee_email` under `binding_id`
    /// and return that binding.
    async fn employee_binding(
        &self,
        actor: &CorporationActor,
        binding_id: Uuid,
        employee_email: &str,
    ) -> ClaResult<Binding> {
        if !email::is_same_corporation(&actor.email, employee_email) {
            return Err(SigningError::NotSameCorporation.into());
        }

        let binding = self.get_binding(binding_id).await?;
        let corp_binding = self.get_binding(actor.binding_id).await?;
        if binding.scope() != corp_binding.scope() {
            return Err(SigningError::ScopeMismatch(
                binding.scope().to_string(),
                corp_binding.scope().to_string(),
            )
            .into());
        }
        Ok(binding)
    }

    /// Activate or deactivate an employee's signing.
    pub async fn update_employee(
        &self,
        actor: &CorporationActor,
        binding_id: Uuid,
        employee_email: &str,
        enabled: bool,
    ) -> ClaResult<()> {
        let binding = self
            .employee_binding(actor, binding_id, employee_email)
            .await?;
        self.ledger
            .set_individual_enabled(binding_id, employee_email, enabled)
            .await
            .inspect_err(log_storage("update_employee"))?;

        let notification = if enabled {
            Notification::EmployeeActivated
        } else {
            Notification::EmployeeDeactivated
        };
        self.notify(
            &binding.org_email,
            vec![email::normalize(employee_email)],
            notification,
        )
        .await;
        Ok(())
    }

    pub async fn remove_employee(
        &self,
        actor: &CorporationActor,
        binding_id: Uuid,
        employee_email: &str,
    ) -> ClaResult<()> {
        let binding = self
            .employee_binding(actor, binding_id, employee_email)
            .await?;
        self.ledger
            .remove_individual(binding_id, employee_email)
            .await
            .inspect_err(log_storage("remove_employee"))?;

        self.notify(
            &binding.org_email,
            vec![email::normalize(employee_email)],
            Notification::EmployeeRemoved,
        )
        .await;
        Ok(())
    }

    /// Register an employee manager for the actor's corporation.
    pub async fn add_manager(
        &self,
        actor: &CorporationActor,
        manager_email: &str,
        name: &str,
    ) -> ClaResult<CorporationManager> {
        if !email::is_same_corporation(&actor.email, manager_email) {
            return Err(SigningError::NotSameCorporation.into());
        }
        let binding = self.get_binding(actor.binding_id).await?;
        ensure_signable(&binding, ApplyTo::Corporation)?;

        let manager = self
            .managers
            .add(CreateCorporationManager {
                binding_id: actor.binding_id,
                email: manager_email.to_string(),
                name: name.to_string(),
                role: ManagerRole::Manager,
            })
            .await
            .inspect_err(log_storage("add_manager"))?;

        self.notify(
            &binding.org_email,
            vec![manager.email.clone()],
            Notification::ManagerAdded { admin: false },
        )
        .await;
        Ok(manager)
    }

    pub async fn remove_manager(&self, actor: &CorporationActor, manager_email: &str) -> ClaResult<()> {
        if !email::is_same_corporation(&actor.email, manager_email) {
            return Err(SigningError::NotSameCorporation.into());
        }
        let binding = self.get_binding(actor.binding_id).await?;

        let manager = self
            .managers
            .get_by_email(actor.binding_id, manager_email)
            .await
            .inspect_err(log_storage("remove_manager"))?;
        if manager.role == ManagerRole::Admin {
            return Err(SigningError::AdminNotRemovable.into());
        }
        self.managers
            .remove(actor.binding_id, &manager.email)
            .await
            .inspect_err(log_storage("remove_manager"))?;

        self.notify(
            &binding.org_email,
            vec![manager.email],
            Notification::ManagerRemoved,
        )
        .await;
        Ok(())
    }

    pub async fn list_managers(
        &self,
        binding_id: Uuid,
        corp_id: &str,
    ) -> ClaResult<Vec<CorporationManager>> {
        self.managers
            .list(binding_id, corp_id, None)
            .await
            .inspect_err(log_storage("list_managers"))
    }

    /// Send a fresh verification code to `recipient` on behalf of the
    /// binding's org and return it for the caller to check later.
    pub async fn send_verification_code(
        &self,
        binding_id: Uuid,
        recipient: &str,
    ) -> ClaResult<String> {
        email::corp_identity_key(recipient)?;
        let binding = self.get_binding(binding_id).await?;

        let code = generate_code(self.config.verification_code_length);
        self.notify(
            &binding.org_email,
            vec![email::normalize(recipient)],
            Notification::VerificationCode { code: code.clone() },
        )
        .await;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_digits_of_requested_length() {
        let code = generate_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(generate_code(0).len(), 1);
    }
}
