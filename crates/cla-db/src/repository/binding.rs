//! SurrealDB implementation of [`BindingRepository`].

use cla_core::email;
use cla_core::error::{ClaError, ClaResult};
use cla_core::models::binding::{Binding, BindingFilter, CreateBinding, UpdateBinding};
use cla_core::repository::BindingRepository;
use cla_core::resolution::ResolutionQuery;
use surrealdb::{Connection, Surreal};
use tracing::info;
use uuid::Uuid;

use super::rows::{BINDING_TABLE, BindingRow, CreatedRow, apply_to_str};
use crate::connection::StoreConfig;
use crate::error::DbError;
use crate::write_path::with_deadline;

/// Load one binding row by id.
pub(crate) async fn select_binding<C: Connection>(
    db: &Surreal<C>,
    id: Uuid,
) -> Result<BindingRow, DbError> {
    let id_str = id.to_string();

    let mut result = db
        .query("SELECT meta::id(id) AS record_id, * FROM type::record('cla_binding', $id)")
        .bind(("id", id_str.clone()))
        .await
        .map_err(DbError::from)?;

    let rows: Vec<BindingRow> = result.take(0).map_err(DbError::from)?;
    rows.into_iter().next().ok_or_else(|| DbError::NotFound {
        entity: BINDING_TABLE.into(),
        id: id_str,
    })
}

/// Enabled bindings that may govern `query`, oldest first.
pub(crate) async fn select_candidates<C: Connection>(
    db: &Surreal<C>,
    query: &ResolutionQuery,
) -> Result<Vec<Binding>, DbError> {
    let repos = serde_json::json!(query.candidate_repos());

    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id, * FROM cla_binding \
             WHERE platform = $platform AND org_id = $org_id \
             AND apply_to = $apply_to AND enabled = true \
             AND repo_id INSIDE $repos \
             ORDER BY created_at ASC",
        )
        .bind(("platform", query.scope.platform.clone()))
        .bind(("org_id", query.scope.org_id.clone()))
        .bind(("apply_to", apply_to_str(query.apply_to)))
        .bind(("repos", repos))
        .await
        .map_err(DbError::from)?;

    let rows: Vec<BindingRow> = result.take(0).map_err(DbError::from)?;
    rows.into_iter().map(BindingRow::into_binding).collect()
}

fn validate(input: &CreateBinding) -> ClaResult<()> {
    for (field, value) in [
        ("platform", &input.platform),
        ("org_id", &input.org_id),
        ("cla_id", &input.cla_id),
        ("cla_language", &input.cla_language),
        ("submitter", &input.submitter),
    ] {
        if value.trim().is_empty() {
            return Err(ClaError::invalid(format!("{field} must not be empty")));
        }
    }
    email::corp_identity_key(&input.org_email)?;
    Ok(())
}

/// SurrealDB implementation of the binding repository.
#[derive(Clone)]
pub struct SurrealBindingRepository<C: Connection> {
    db: Surreal<C>,
    config: StoreConfig,
}

impl<C: Connection> SurrealBindingRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_config(db, StoreConfig::default())
    }

    pub fn with_config(db: Surreal<C>, config: StoreConfig) -> Self {
        Self { db, config }
    }

    async fn insert(&self, input: CreateBinding) -> Result<Binding, DbError> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let org_email = email::normalize(&input.org_email);

        let result = self
            .db
            .query(
                "CREATE type::record('cla_binding', $id) SET \
                 platform = $platform, \
                 org_id = $org_id, \
                 repo_id = $repo_id, \
                 apply_to = $apply_to, \
                 cla_id = $cla_id, \
                 cla_language = $cla_language, \
                 org_email = $org_email, \
                 submitter = $submitter, \
                 enabled = true, \
                 org_signature_uploaded = false, \
                 version = 0, \
                 individuals = [], \
                 corporations = []",
            )
            .bind(("id", id_str.clone()))
            .bind(("platform", input.platform.trim().to_string()))
            .bind(("org_id", input.org_id.trim().to_string()))
            .bind(("repo_id", input.repo_id.trim().to_string()))
            .bind(("apply_to", apply_to_str(input.apply_to)))
            .bind(("cla_id", input.cla_id.clone()))
            .bind(("cla_language", input.cla_language.clone()))
            .bind(("org_email", org_email.clone()))
            .bind(("submitter", input.submitter.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::query)?;

        let rows: Vec<CreatedRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: BINDING_TABLE.into(),
            id: id_str,
        })?;

        Ok(Binding {
            id,
            platform: input.platform.trim().to_string(),
            org_id: input.org_id.trim().to_string(),
            repo_id: input.repo_id.trim().to_string(),
            apply_to: input.apply_to,
            cla_id: input.cla_id,
            cla_language: input.cla_language,
            org_email,
            submitter: input.submitter,
            enabled: true,
            org_signature_uploaded: false,
            individuals: Vec::new(),
            corporations: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn apply_update(&self, id: Uuid, input: UpdateBinding) -> Result<Binding, DbError> {
        let mut sets = Vec::new();
        if input.enabled.is_some() {
            sets.push("enabled = $enabled");
        }
        if input.org_email.is_some() {
            sets.push("org_email = $org_email");
        }
        if input.org_signature_uploaded.is_some() {
            sets.push("org_signature_uploaded = $org_signature_uploaded");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('cla_binding', $id) SET {} \
             RETURN AFTER",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(enabled) = input.enabled {
            builder = builder.bind(("enabled", enabled));
        }
        if let Some(org_email) = input.org_email {
            builder = builder.bind(("org_email", email::normalize(&org_email)));
        }
        if let Some(uploaded) = input.org_signature_uploaded {
            builder = builder.bind(("org_signature_uploaded", uploaded));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::query)?;
        let updated: Vec<CreatedRow> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: BINDING_TABLE.into(),
                id: id.to_string(),
            });
        }

        select_binding(&self.db, id).await?.into_binding()
    }

    /// Delete the binding and its managers in one transaction, so a
    /// failure on either side leaves both in place.
    async fn delete_with_managers(&self, id: Uuid) -> Result<(), DbError> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE type::record('cla_binding', $id) RETURN BEFORE; \
                 DELETE corporation_manager WHERE binding_id = $id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::query)?;
        let deleted: Vec<CreatedRow> = result.take(0).map_err(DbError::from)?;
        if deleted.is_empty() {
            return Err(DbError::NotFound {
                entity: BINDING_TABLE.into(),
                id: id_str,
            });
        }
        Ok(())
    }

    async fn select(&self, filter: BindingFilter) -> Result<Vec<Binding>, DbError> {
        let mut conditions = Vec::new();
        if filter.platform.is_some() {
            conditions.push("platform = $platform");
        }
        if filter.org_id.is_some() {
            conditions.push("org_id = $org_id");
        }
        if filter.repo_id.is_some() {
            conditions.push("repo_id = $repo_id");
        }
        if filter.apply_to.is_some() {
            conditions.push("apply_to = $apply_to");
        }
        if filter.enabled.is_some() {
            conditions.push("enabled = $enabled");
        }
        if filter.cla_language.is_some() {
            conditions.push("cla_language = $cla_language");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM cla_binding{where_clause} \
             ORDER BY created_at ASC"
        );

        let mut builder = self.db.query(&query);
        if let Some(platform) = filter.platform {
            builder = builder.bind(("platform", platform));
        }
        if let Some(org_id) = filter.org_id {
            builder = builder.bind(("org_id", org_id));
        }
        if let Some(repo_id) = filter.repo_id {
            builder = builder.bind(("repo_id", repo_id));
        }
        if let Some(apply_to) = filter.apply_to {
            builder = builder.bind(("apply_to", apply_to_str(apply_to)));
        }
        if let Some(enabled) = filter.enabled {
            builder = builder.bind(("enabled", enabled));
        }
        if let Some(cla_language) = filter.cla_language {
            builder = builder.bind(("cla_language", cla_language));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<BindingRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter().map(BindingRow::into_binding).collect()
    }
}

impl<C: Connection> BindingRepository for SurrealBindingRepository<C> {
    async fn create(&self, input: CreateBinding) -> ClaResult<Binding> {
        validate(&input)?;
        let binding = with_deadline(&self.config, "create_binding", self.insert(input)).await?;
        info!(
            binding_id = %binding.id,
            scope = %binding.scope(),
            apply_to = %binding.apply_to,
            "Binding created"
        );
        Ok(binding)
    }

    async fn get_by_id(&self, id: Uuid) -> ClaResult<Binding> {
        let row = with_deadline(&self.config, "get_binding", select_binding(&self.db, id)).await?;
        row.into_binding().map_err(Into::into)
    }

    async fn update(&self, id: Uuid, input: UpdateBinding) -> ClaResult<Binding> {
        if let Some(org_email) = &input.org_email {
            email::corp_identity_key(org_email)?;
        }
        let binding =
            with_deadline(&self.config, "update_binding", self.apply_update(id, input)).await?;
        info!(binding_id = %id, enabled = binding.enabled, "Binding updated");
        Ok(binding)
    }

    async fn delete(&self, id: Uuid) -> ClaResult<()> {
        with_deadline(&self.config, "delete_binding", self.delete_with_managers(id)).await?;
        info!(binding_id = %id, "Binding deleted");
        Ok(())
    }

    async fn list(&self, filter: BindingFilter) -> ClaResult<Vec<Binding>> {
        with_deadline(&self.config, "list_bindings", self.select(filter))
            .await
            .map_err(Into::into)
    }

    async fn find_candidates(&self, query: &ResolutionQuery) -> ClaResult<Vec<Binding>> {
        with_deadline(
            &self.config,
            "find_candidates",
            select_candidates(&self.db, query),
        )
        .await
        .map_err(Into::into)
    }
}
