//! Corporation manager model.
//!
//! Managers are provisioned elsewhere; this store only records who they
//! are so that notifications can be fanned out to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ManagerRole {
    /// The corporation administrator created when signing completes.
    Admin,
    /// Employee managers added by the administrator.
    Manager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorporationManager {
    pub id: Uuid,
    /// The corporation binding the manager acts under.
    pub binding_id: Uuid,
    pub corp_id: String,
    pub email: String,
    pub name: String,
    pub role: ManagerRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCorporationManager {
    pub binding_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: ManagerRole,
}
