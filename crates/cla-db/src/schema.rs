//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables use SCHEMAFULL mode. UUIDs are stored as strings, enums as
//! strings with ASSERT constraints. Signing records live inside their
//! binding as embedded arrays, so a single-record update covers every
//! ledger mutation. `version` is a revision counter bumped on each ledger
//! write.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- CLA bindings with embedded signing records
-- =======================================================================
DEFINE TABLE cla_binding SCHEMAFULL;
DEFINE FIELD platform ON TABLE cla_binding TYPE string;
DEFINE FIELD org_id ON TABLE cla_binding TYPE string;
DEFINE FIELD repo_id ON TABLE cla_binding TYPE string DEFAULT '';
DEFINE FIELD apply_to ON TABLE cla_binding TYPE string \
    ASSERT $value IN ['Individual', 'Corporation'];
DEFINE FIELD cla_id ON TABLE cla_binding TYPE string;
DEFINE FIELD cla_language ON TABLE cla_binding TYPE string;
DEFINE FIELD org_email ON TABLE cla_binding TYPE string;
DEFINE FIELD submitter ON TABLE cla_binding TYPE string;
DEFINE FIELD enabled ON TABLE cla_binding TYPE bool DEFAULT true;
DEFINE FIELD org_signature_uploaded ON TABLE cla_binding TYPE bool \
    DEFAULT false;
DEFINE FIELD version ON TABLE cla_binding TYPE int DEFAULT 0;

DEFINE FIELD individuals ON TABLE cla_binding TYPE array DEFAULT [];
DEFINE FIELD individuals.* ON TABLE cla_binding TYPE object;
DEFINE FIELD individuals.*.email ON TABLE cla_binding TYPE string;
DEFINE FIELD individuals.*.name ON TABLE cla_binding TYPE string;
DEFINE FIELD individuals.*.corp_id ON TABLE cla_binding TYPE string;
DEFINE FIELD individuals.*.enabled ON TABLE cla_binding TYPE bool;
DEFINE FIELD individuals.*.signed_at ON TABLE cla_binding TYPE string;
DEFINE FIELD individuals.*.info ON TABLE cla_binding TYPE object \
    FLEXIBLE DEFAULT {};

DEFINE FIELD corporations ON TABLE cla_binding TYPE array DEFAULT [];
DEFINE FIELD corporations.* ON TABLE cla_binding TYPE object;
DEFINE FIELD corporations.*.corp_id ON TABLE cla_binding TYPE string;
DEFINE FIELD corporations.*.admin_email ON TABLE cla_binding TYPE string;
DEFINE FIELD corporations.*.admin_name ON TABLE cla_binding TYPE string;
DEFINE FIELD corporations.*.corp_name ON TABLE cla_binding TYPE string;
DEFINE FIELD corporations.*.signed_at ON TABLE cla_binding TYPE string;
DEFINE FIELD corporations.*.info ON TABLE cla_binding TYPE object \
    FLEXIBLE DEFAULT {};
DEFINE FIELD corporations.*.pdf_uploaded ON TABLE cla_binding TYPE bool \
    DEFAULT false;
DEFINE FIELD corporations.*.admin_added ON TABLE cla_binding TYPE bool \
    DEFAULT false;
DEFINE FIELD corporations.*.pdf ON TABLE cla_binding TYPE option<string>;

DEFINE FIELD created_at ON TABLE cla_binding TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE cla_binding TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_cla_binding_scope ON TABLE cla_binding \
    COLUMNS platform, org_id, repo_id, apply_to;

-- =======================================================================
-- Corporation managers (scoped to a corporation binding)
-- =======================================================================
DEFINE TABLE corporation_manager SCHEMAFULL;
DEFINE FIELD binding_id ON TABLE corporation_manager TYPE string;
DEFINE FIELD corp_id ON TABLE corporation_manager TYPE string;
DEFINE FIELD email ON TABLE corporation_manager TYPE string;
DEFINE FIELD name ON TABLE corporation_manager TYPE string;
DEFINE FIELD role ON TABLE corporation_manager TYPE string \
    ASSERT $value IN ['Admin', 'Manager'];
DEFINE FIELD created_at ON TABLE corporation_manager TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_corporation_manager_email ON TABLE corporation_manager \
    COLUMNS binding_id, email UNIQUE;
DEFINE INDEX idx_corporation_manager_corp ON TABLE corporation_manager \
    COLUMNS binding_id, corp_id;
";

// -----------------------------------------------------------------------
// Migration runner
// -----------------------------------------------------------------------

/// Run all pending migrations against the database.
///
/// Creates the `_migration` tracking table when needed, then applies
/// every migration newer than the recorded version, in order.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
