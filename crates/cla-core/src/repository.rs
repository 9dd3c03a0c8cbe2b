//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Signing records have no identity
//! of their own: every ledger operation is addressed through the id of
//! the binding that owns them.

use uuid::Uuid;

use crate::error::ClaResult;
use crate::models::{
    binding::{Binding, BindingFilter, CreateBinding, UpdateBinding},
    corporation::{
        CorporationFlag, CorporationSigning, CorporationSigningFilter, CreateCorporationSigning,
    },
    individual::{CreateIndividualSigning, IndividualSigning, IndividualSigningFilter},
    manager::{CorporationManager, CreateCorporationManager, ManagerRole},
};
use crate::resolution::ResolutionQuery;

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

pub trait BindingRepository: Send + Sync {
    /// Persist a new, enabled binding with no signing records.
    fn create(&self, input: CreateBinding) -> impl Future<Output = ClaResult<Binding>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ClaResult<Binding>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateBinding,
    ) -> impl Future<Output = ClaResult<Binding>> + Send;
    /// Delete the binding together with every record it owns.
    fn delete(&self, id: Uuid) -> impl Future<Output = ClaResult<()>> + Send;
    fn list(&self, filter: BindingFilter) -> impl Future<Output = ClaResult<Vec<Binding>>> + Send;
    /// Enabled bindings that may govern `query`, in creation order.
    fn find_candidates(
        &self,
        query: &ResolutionQuery,
    ) -> impl Future<Output = ClaResult<Vec<Binding>>> + Send;
}

// ---------------------------------------------------------------------------
// Signing records embedded in a binding
// ---------------------------------------------------------------------------

pub trait SignerLedger: Send + Sync {
    /// Append an individual (or employee, with `enabled = false`) record.
    ///
    /// Fails with `AlreadySigned` if the email already signed under this
    /// binding or under another enabled binding of the same scope.
    fn append_individual(
        &self,
        binding_id: Uuid,
        input: CreateIndividualSigning,
        enabled: bool,
    ) -> impl Future<Output = ClaResult<IndividualSigning>> + Send;

    /// Append a corporation record keyed by the admin email domain.
    fn append_corporation(
        &self,
        binding_id: Uuid,
        input: CreateCorporationSigning,
    ) -> impl Future<Output = ClaResult<CorporationSigning>> + Send;

    /// Update only the targeted fields of one corporation record.
    fn set_corporation_flag(
        &self,
        binding_id: Uuid,
        corp_id: &str,
        flag: CorporationFlag,
    ) -> impl Future<Output = ClaResult<()>> + Send;

    /// Activate or deactivate one individual record.
    fn set_individual_enabled(
        &self,
        binding_id: Uuid,
        email: &str,
        enabled: bool,
    ) -> impl Future<Output = ClaResult<()>> + Send;

    fn list_individuals(
        &self,
        binding_id: Uuid,
        filter: IndividualSigningFilter,
    ) -> impl Future<Output = ClaResult<Vec<IndividualSigning>>> + Send;

    fn list_corporations(
        &self,
        binding_id: Uuid,
        filter: CorporationSigningFilter,
    ) -> impl Future<Output = ClaResult<Vec<CorporationSigning>>> + Send;

    fn remove_individual(
        &self,
        binding_id: Uuid,
        email: &str,
    ) -> impl Future<Output = ClaResult<()>> + Send;

    /// Fetch the signed PDF of a corporation.
    ///
    /// `NotFound` if there is no such record, `PdfNotUploaded` if the
    /// record exists but no PDF was stored.
    fn get_pdf(
        &self,
        binding_id: Uuid,
        corp_id: &str,
    ) -> impl Future<Output = ClaResult<Vec<u8>>> + Send;
}

// ---------------------------------------------------------------------------
// Corporation managers
// ---------------------------------------------------------------------------

pub trait CorporationManagerRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the email is already a manager under
    /// the binding.
    fn add(
        &self,
        input: CreateCorporationManager,
    ) -> impl Future<Output = ClaResult<CorporationManager>> + Send;
    fn get_by_email(
        &self,
        binding_id: Uuid,
        email: &str,
    ) -> impl Future<Output = ClaResult<CorporationManager>> + Send;
    fn list(
        &self,
        binding_id: Uuid,
        corp_id: &str,
        role: Option<ManagerRole>,
    ) -> impl Future<Output = ClaResult<Vec<CorporationManager>>> + Send;
    fn remove(&self, binding_id: Uuid, email: &str)
    -> impl Future<Output = ClaResult<()>> + Send;
}
