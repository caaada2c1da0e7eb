//! Ownership lookups for projects and characters.

use mockup_core::types::DbId;
use sqlx::PgPool;

use crate::models::project::{IpCharacter, Project};

const PROJECT_COLUMNS: &str = "id, user_id, name, created_at, updated_at";

const CHARACTER_COLUMNS: &str = "id, project_id, name, file_path, created_at";

/// Read access to projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Find a project only if it belongs to `user_id`.
    pub async fn find_owned(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Project>(&query)
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}

/// Read access to IP characters.
pub struct CharacterRepo;

impl CharacterRepo {
    /// Find a character only if it belongs to `project_id`.
    pub async fn find_in_project(
        pool: &PgPool,
        character_id: DbId,
        project_id: DbId,
    ) -> Result<Option<IpCharacter>, sqlx::Error> {
        let query = format!(
            "SELECT {CHARACTER_COLUMNS} FROM ip_characters WHERE id = $1 AND project_id = $2"
        );
        sqlx::query_as::<_, IpCharacter>(&query)
            .bind(character_id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }
}
