//! SurrealDB implementation of [`SignerLedger`].
//!
//! All mutations go through a [`WriteSession`]: load the binding, check
//! the mutation against it, then write with a guard on the signer being
//! touched. Appends require the signer key to be absent from the array,
//! element updates require the addressed slot to still hold the same
//! signer, so a write never duplicates a signer or lands on a shifted
//! record, while writes for other signers of the binding go through.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use cla_core::email;
use cla_core::error::{ClaError, ClaResult};
use cla_core::models::binding::{ApplyTo, Binding};
use cla_core::models::corporation::{
    CorporationFlag, CorporationSigning, CorporationSigningFilter, CreateCorporationSigning,
};
use cla_core::models::individual::{
    CreateIndividualSigning, IndividualSigning, IndividualSigningFilter,
};
use cla_core::repository::SignerLedger;
use cla_core::resolution::ResolutionQuery;
use serde_json::Value;
use surrealdb::{Connection, Surreal};
use tracing::info;
use uuid::Uuid;

use super::binding::{select_binding, select_candidates};
use super::rows::{
    BINDING_TABLE, CorporationSigningDoc, IndividualSigningDoc, StoredBinding, VersionRow,
    empty_object,
};
use crate::connection::StoreConfig;
use crate::error::DbError;
use crate::write_path::{WriteSession, with_deadline};

/// One guarded update of a binding's embedded arrays.
struct Mutation {
    set: String,
    /// `WHERE` condition evaluated atomically with the write.
    guard: String,
    key: String,
    value: Value,
}

impl Mutation {
    /// Push `value` onto `field` unless a record with `key` already sits
    /// at `field.key_field`.
    fn append(field: &str, key_field: &str, key: &str, value: Value) -> Self {
        Self {
            set: format!("{field} += $value"),
            guard: format!("enabled = true AND $key NOTINSIDE {field}.{key_field}"),
            key: key.to_string(),
            value,
        }
    }

    fn corporation(index: usize, set: String, corp_id: &str, value: Value) -> Self {
        Self {
            set,
            guard: format!("enabled = true AND corporations[{index}].corp_id = $key"),
            key: corp_id.to_string(),
            value,
        }
    }

    fn individual(index: usize, set: String, email: &str, value: Value) -> Self {
        Self {
            set,
            guard: format!("individuals[{index}].email = $key"),
            key: email.to_string(),
            value,
        }
    }

    /// Narrow the guard further.
    fn and(mut self, condition: &str) -> Self {
        self.guard = format!("{} AND {condition}", self.guard);
        self
    }
}

/// Reject writes against disabled bindings or bindings of the other kind.
fn check_signable(binding: &Binding, kind: ApplyTo) -> ClaResult<()> {
    if !binding.enabled {
        return Err(ClaError::not_found(BINDING_TABLE, binding.id));
    }
    if binding.apply_to != kind {
        return Err(ClaError::invalid(format!(
            "binding {} governs {} signers, not {kind} signers",
            binding.id, binding.apply_to
        )));
    }
    Ok(())
}

fn corporation_index(binding: &Binding, corp_id: &str) -> ClaResult<usize> {
    binding
        .corporations
        .iter()
        .position(|c| c.corp_id == corp_id)
        .ok_or_else(|| ClaError::not_found("corporation_signing", corp_id))
}

fn individual_index(binding: &Binding, email: &str) -> ClaResult<usize> {
    binding
        .individuals
        .iter()
        .position(|s| s.email.eq_ignore_ascii_case(email.trim()))
        .ok_or_else(|| ClaError::not_found("individual_signing", email))
}

/// SurrealDB implementation of the signer ledger.
#[derive(Clone)]
pub struct SurrealSignerLedger<C: Connection> {
    db: Surreal<C>,
    config: StoreConfig,
}

impl<C: Connection> SurrealSignerLedger<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_config(db, StoreConfig::default())
    }

    pub fn with_config(db: Surreal<C>, config: StoreConfig) -> Self {
        Self { db, config }
    }

    async fn load(&self, binding_id: Uuid) -> Result<StoredBinding, DbError> {
        select_binding(&self.db, binding_id).await?.decode()
    }

    /// Whether another enabled binding of the same scope and kind already
    /// holds a record accepted by `signed`.
    async fn signed_elsewhere(
        &self,
        binding: &Binding,
        signed: impl Fn(&Binding) -> bool,
    ) -> Result<bool, DbError> {
        let query = ResolutionQuery::exact(binding.scope(), binding.apply_to);
        let siblings = select_candidates(&self.db, &query).await?;
        Ok(siblings.iter().any(|b| b.id != binding.id && signed(b)))
    }

    /// Apply `mutation` if its guard holds. Returns the binding's new
    /// revision, or `None` when the guard rejected the write.
    async fn commit(&self, binding_id: Uuid, mutation: Mutation) -> Result<Option<u64>, DbError> {
        let query = format!(
            "UPDATE type::record('cla_binding', $id) SET {}, \
             version += 1, updated_at = time::now() \
             WHERE {} RETURN version",
            mutation.set, mutation.guard
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", binding_id.to_string()))
            .bind(("key", mutation.key))
            .bind(("value", mutation.value))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::query)?;
        let rows: Vec<VersionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|row| row.version))
    }
}

impl<C: Connection> SignerLedger for SurrealSignerLedger<C> {
    async fn append_individual(
        &self,
        binding_id: Uuid,
        input: CreateIndividualSigning,
        enabled: bool,
    ) -> ClaResult<IndividualSigning> {
        let address = email::normalize(&input.email);
        let corp_id = email::corp_identity_key(&address)?;
        if input.name.trim().is_empty() {
            return Err(ClaError::invalid("name must not be empty"));
        }

        let signing = IndividualSigning {
            email: address,
            name: input.name.trim().to_string(),
            corp_id,
            enabled,
            signed_at: Utc::now(),
            info: input.info.unwrap_or_else(empty_object),
        };
        let doc = serde_json::to_value(IndividualSigningDoc::from(&signing))
            .map_err(DbError::decode)?;

        let mut session = WriteSession::new(&self.config, "append_individual");
        while session.next_attempt().await {
            let stored = session.run(self.load(binding_id)).await?;
            check_signable(&stored.binding, ApplyTo::Individual)?;
            if stored.binding.individual(&signing.email).is_some() {
                return Err(ClaError::AlreadySigned);
            }
            let elsewhere = session
                .run(self.signed_elsewhere(&stored.binding, |b| {
                    b.individual(&signing.email).is_some()
                }))
                .await?;
            if elsewhere {
                return Err(ClaError::AlreadySigned);
            }

            let mutation = Mutation::append("individuals", "email", &signing.email, doc.clone());
            let outcome = session.run(self.commit(binding_id, mutation)).await;
            if let Some(revision) = session.settle(outcome)? {
                info!(
                    binding_id = %binding_id,
                    email = %signing.email,
                    enabled,
                    revision,
                    "Individual signing recorded"
                );
                return Ok(signing);
            }
        }
        Err(session.exhausted())
    }

    async fn append_corporation(
        &self,
        binding_id: Uuid,
        input: CreateCorporationSigning,
    ) -> ClaResult<CorporationSigning> {
        let admin_email = email::normalize(&input.admin_email);
        let corp_id = email::corp_identity_key(&admin_email)?;
        if input.corporation_name.trim().is_empty() {
            return Err(ClaError::invalid("corporation name must not be empty"));
        }

        let signing = CorporationSigning {
            corp_id,
            admin_email,
            admin_name: input.admin_name.trim().to_string(),
            corporation_name: input.corporation_name.trim().to_string(),
            signed_at: Utc::now(),
            info: input.info.unwrap_or_else(empty_object),
            pdf_uploaded: false,
            admin_added: false,
        };
        let doc = serde_json::to_value(CorporationSigningDoc::from(&signing))
            .map_err(DbError::decode)?;

        let mut session = WriteSession::new(&self.config, "append_corporation");
        while session.next_attempt().await {
            let stored = session.run(self.load(binding_id)).await?;
            check_signable(&stored.binding, ApplyTo::Corporation)?;
            if stored.binding.corporation(&signing.corp_id).is_some() {
                return Err(ClaError::AlreadySigned);
            }
            let elsewhere = session
                .run(self.signed_elsewhere(&stored.binding, |b| {
                    b.corporation(&signing.corp_id).is_some()
                }))
                .await?;
            if elsewhere {
                return Err(ClaError::AlreadySigned);
            }

            let mutation =
                Mutation::append("corporations", "corp_id", &signing.corp_id, doc.clone());
            let outcome = session.run(self.commit(binding_id, mutation)).await;
            if let Some(revision) = session.settle(outcome)? {
                info!(
                    binding_id = %binding_id,
                    corp_id = %signing.corp_id,
                    revision,
                    "Corporation signing recorded"
                );
                return Ok(signing);
            }
        }
        Err(session.exhausted())
    }

    async fn set_corporation_flag(
        &self,
        binding_id: Uuid,
        corp_id: &str,
        flag: CorporationFlag,
    ) -> ClaResult<()> {
        let pdf = match &flag {
            CorporationFlag::Pdf(bytes) if bytes.is_empty() => {
                return Err(ClaError::invalid("PDF must not be empty"));
            }
            CorporationFlag::Pdf(bytes) => Some(STANDARD.encode(bytes)),
            CorporationFlag::AdminAdded => None,
        };

        let mut session = WriteSession::new(&self.config, "set_corporation_flag");
        while session.next_attempt().await {
            let stored = session.run(self.load(binding_id)).await?;
            check_signable(&stored.binding, ApplyTo::Corporation)?;
            let index = corporation_index(&stored.binding, corp_id)?;

            let mutation = match &pdf {
                None => {
                    if stored.binding.corporations[index].admin_added {
                        return Err(ClaError::AlreadyExists {
                            entity: "corporation administrator".into(),
                        });
                    }
                    Mutation::corporation(
                        index,
                        format!("corporations[{index}].admin_added = $value"),
                        corp_id,
                        Value::Bool(true),
                    )
                    .and(&format!("corporations[{index}].admin_added = false"))
                }
                Some(encoded) => Mutation::corporation(
                    index,
                    format!(
                        "corporations[{index}].pdf = $value, \
                         corporations[{index}].pdf_uploaded = true"
                    ),
                    corp_id,
                    Value::String(encoded.clone()),
                ),
            };

            let outcome = session.run(self.commit(binding_id, mutation)).await;
            if let Some(revision) = session.settle(outcome)? {
                info!(
                    binding_id = %binding_id,
                    corp_id,
                    revision,
                    flag = if pdf.is_some() { "pdf" } else { "admin_added" },
                    "Corporation signing updated"
                );
                return Ok(());
            }
        }
        Err(session.exhausted())
    }

    async fn set_individual_enabled(
        &self,
        binding_id: Uuid,
        email: &str,
        enabled: bool,
    ) -> ClaResult<()> {
        let mut session = WriteSession::new(&self.config, "set_individual_enabled");
        while session.next_attempt().await {
            let stored = session.run(self.load(binding_id)).await?;
            let index = individual_index(&stored.binding, email)?;
            let record = &stored.binding.individuals[index];
            if record.enabled == enabled {
                return Ok(());
            }

            let mutation = Mutation::individual(
                index,
                format!("individuals[{index}].enabled = $value"),
                &record.email,
                Value::Bool(enabled),
            );
            let outcome = session.run(self.commit(binding_id, mutation)).await;
            if let Some(revision) = session.settle(outcome)? {
                info!(
                    binding_id = %binding_id,
                    email,
                    enabled,
                    revision,
                    "Individual signing toggled"
                );
                return Ok(());
            }
        }
        Err(session.exhausted())
    }

    async fn list_individuals(
        &self,
        binding_id: Uuid,
        filter: IndividualSigningFilter,
    ) -> ClaResult<Vec<IndividualSigning>> {
        let stored = with_deadline(&self.config, "list_individuals", self.load(binding_id)).await?;
        Ok(stored
            .binding
            .individuals
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    async fn list_corporations(
        &self,
        binding_id: Uuid,
        filter: CorporationSigningFilter,
    ) -> ClaResult<Vec<CorporationSigning>> {
        let stored =
            with_deadline(&self.config, "list_corporations", self.load(binding_id)).await?;
        Ok(stored
            .binding
            .corporations
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    async fn remove_individual(&self, binding_id: Uuid, email: &str) -> ClaResult<()> {
        let mut session = WriteSession::new(&self.config, "remove_individual");
        while session.next_attempt().await {
            let stored = session.run(self.load(binding_id)).await?;
            let index = individual_index(&stored.binding, email)?;

            let mutation = Mutation::individual(
                index,
                format!("individuals = array::remove(individuals, {index})"),
                &stored.binding.individuals[index].email,
                Value::Null,
            );
            let outcome = session.run(self.commit(binding_id, mutation)).await;
            if let Some(revision) = session.settle(outcome)? {
                info!(binding_id = %binding_id, email, revision, "Individual signing removed");
                return Ok(());
            }
        }
        Err(session.exhausted())
    }

    async fn get_pdf(&self, binding_id: Uuid, corp_id: &str) -> ClaResult<Vec<u8>> {
        let stored = with_deadline(&self.config, "get_pdf", self.load(binding_id)).await?;
        let index = corporation_index(&stored.binding, corp_id)?;

        let encoded = match stored.corporation_pdfs.get(index) {
            Some(Some(encoded)) if stored.binding.corporations[index].pdf_uploaded => encoded,
            _ => return Err(ClaError::PdfNotUploaded),
        };

        STANDARD
            .decode(encoded)
            .map_err(|e| DbError::Decode(format!("invalid PDF encoding: {e}")).into())
    }
}
