//! Read-only views of projects and characters owned by the CRUD side.

use mockup_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `ip_characters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IpCharacter {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub file_path: String,
    pub created_at: Timestamp,
}
