//! CLA Database: SurrealDB persistence for CLA bindings and the signing
//! records embedded in them.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`], [`StoreConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Repository implementations of the `cla-core` traits
//! - The guarded write path used by every ledger mutation
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;
mod write_path;

pub use connection::{DbConfig, DbManager, StoreConfig};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
