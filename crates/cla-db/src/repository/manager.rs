//! SurrealDB implementation of [`CorporationManagerRepository`].

use chrono::{DateTime, Utc};
use cla_core::email;
use cla_core::error::{ClaError, ClaResult};
use cla_core::models::manager::{CorporationManager, CreateCorporationManager, ManagerRole};
use cla_core::repository::CorporationManagerRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::connection::StoreConfig;
use crate::error::DbError;
use crate::write_path::with_deadline;

const MANAGER_TABLE: &str = "corporation_manager";

fn parse_role(s: &str) -> Result<ManagerRole, DbError> {
    match s {
        "Admin" => Ok(ManagerRole::Admin),
        "Manager" => Ok(ManagerRole::Manager),
        other => Err(DbError::Decode(format!("unknown manager role: {other}"))),
    }
}

fn role_to_str(role: ManagerRole) -> &'static str {
    match role {
        ManagerRole::Admin => "Admin",
        ManagerRole::Manager => "Manager",
    }
}

#[derive(Debug, SurrealValue)]
struct ManagerCreatedRow {
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ManagerRowWithId {
    record_id: String,
    binding_id: String,
    corp_id: String,
    email: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl ManagerRowWithId {
    fn try_into_manager(self) -> Result<CorporationManager, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        let binding_id = Uuid::parse_str(&self.binding_id)
            .map_err(|e| DbError::Decode(format!("invalid binding UUID: {e}")))?;
        Ok(CorporationManager {
            id,
            binding_id,
            corp_id: self.corp_id,
            email: self.email,
            name: self.name,
            role: parse_role(&self.role)?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the corporation manager repository.
#[derive(Clone)]
pub struct SurrealCorporationManagerRepository<C: Connection> {
    db: Surreal<C>,
    config: StoreConfig,
}

impl<C: Connection> SurrealCorporationManagerRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_config(db, StoreConfig::default())
    }

    pub fn with_config(db: Surreal<C>, config: StoreConfig) -> Self {
        Self { db, config }
    }

    async fn insert(
        &self,
        input: CreateCorporationManager,
        address: String,
        corp_id: String,
    ) -> Result<CorporationManager, DbError> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('corporation_manager', $id) SET \
                 binding_id = $binding_id, \
                 corp_id = $corp_id, \
                 email = $email, \
                 name = $name, \
                 role = $role",
            )
            .bind(("id", id_str.clone()))
            .bind(("binding_id", input.binding_id.to_string()))
            .bind(("corp_id", corp_id.clone()))
            .bind(("email", address.clone()))
            .bind(("name", input.name.clone()))
            .bind(("role", role_to_str(input.role)))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::query)?;
        let rows: Vec<ManagerCreatedRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: MANAGER_TABLE.into(),
            id: id_str,
        })?;

        Ok(CorporationManager {
            id,
            binding_id: input.binding_id,
            corp_id,
            email: address,
            name: input.name,
            role: input.role,
            created_at: row.created_at,
        })
    }

    async fn select_by_email(
        &self,
        binding_id: Uuid,
        address: String,
    ) -> Result<Vec<CorporationManager>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM corporation_manager \
                 WHERE binding_id = $binding_id AND email = $email",
            )
            .bind(("binding_id", binding_id.to_string()))
            .bind(("email", address))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ManagerRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(ManagerRowWithId::try_into_manager)
            .collect()
    }

    async fn select(
        &self,
        binding_id: Uuid,
        corp_id: String,
        role: Option<ManagerRole>,
    ) -> Result<Vec<CorporationManager>, DbError> {
        let role_clause = if role.is_some() {
            " AND role = $role"
        } else {
            ""
        };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM corporation_manager \
             WHERE binding_id = $binding_id AND corp_id = $corp_id{role_clause} \
             ORDER BY created_at ASC"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("binding_id", binding_id.to_string()))
            .bind(("corp_id", corp_id));
        if let Some(role) = role {
            builder = builder.bind(("role", role_to_str(role)));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<ManagerRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(ManagerRowWithId::try_into_manager)
            .collect()
    }

    async fn delete_by_email(&self, binding_id: Uuid, address: String) -> Result<bool, DbError> {
        let result = self
            .db
            .query(
                "DELETE corporation_manager \
                 WHERE binding_id = $binding_id AND email = $email \
                 RETURN BEFORE",
            )
            .bind(("binding_id", binding_id.to_string()))
            .bind(("email", address))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::query)?;
        let deleted: Vec<ManagerCreatedRow> = result.take(0).map_err(DbError::from)?;
        Ok(!deleted.is_empty())
    }
}

impl<C: Connection> CorporationManagerRepository for SurrealCorporationManagerRepository<C> {
    async fn add(&self, input: CreateCorporationManager) -> ClaResult<CorporationManager> {
        let address = email::normalize(&input.email);
        let corp_id = email::corp_identity_key(&address)?;

        let existing = with_deadline(
            &self.config,
            "get_manager",
            self.select_by_email(input.binding_id, address.clone()),
        )
        .await?;
        if !existing.is_empty() {
            return Err(ClaError::AlreadyExists {
                entity: MANAGER_TABLE.into(),
            });
        }

        let manager = match with_deadline(
            &self.config,
            "add_manager",
            self.insert(input, address, corp_id),
        )
        .await
        {
            Ok(manager) => manager,
            Err(e) if e.is_duplicate() => {
                return Err(ClaError::AlreadyExists {
                    entity: MANAGER_TABLE.into(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            binding_id = %manager.binding_id,
            corp_id = %manager.corp_id,
            role = ?manager.role,
            "Corporation manager added"
        );
        Ok(manager)
    }

    async fn get_by_email(
        &self,
        binding_id: Uuid,
        manager_email: &str,
    ) -> ClaResult<CorporationManager> {
        let address = email::normalize(manager_email);
        let managers = with_deadline(
            &self.config,
            "get_manager",
            self.select_by_email(binding_id, address.clone()),
        )
        .await?;
        managers
            .into_iter()
            .next()
            .ok_or_else(|| ClaError::not_found(MANAGER_TABLE, address))
    }

    async fn list(
        &self,
        binding_id: Uuid,
        corp_id: &str,
        role: Option<ManagerRole>,
    ) -> ClaResult<Vec<CorporationManager>> {
        with_deadline(
            &self.config,
            "list_managers",
            self.select(binding_id, corp_id.to_string(), role),
        )
        .await
        .map_err(Into::into)
    }

    async fn remove(&self, binding_id: Uuid, manager_email: &str) -> ClaResult<()> {
        let address = email::normalize(manager_email);
        let removed = with_deadline(
            &self.config,
            "remove_manager",
            self.delete_by_email(binding_id, address.clone()),
        )
        .await?;
        if !removed {
            return Err(ClaError::not_found(MANAGER_TABLE, address));
        }
        info!(binding_id = %binding_id, email = %address, "Corporation manager removed");
        Ok(())
    }
}
