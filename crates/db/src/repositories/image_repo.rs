//! Repository for the `generated_images` table.

use mockup_core::types::DbId;
use sqlx::PgPool;

use crate::models::image::{GeneratedImage, NewGeneratedImage};

/// Column list for `generated_images` queries.
const COLUMNS: &str = "\
    id, generation_id, file_path, thumbnail_path, is_selected, \
    width, height, file_size, signature_turn, signature_slot, created_at";

/// Provides persistence for generated images.
pub struct ImageRepo;

impl ImageRepo {
    pub async fn create(
        pool: &PgPool,
        generation_id: DbId,
        input: &NewGeneratedImage,
    ) -> Result<GeneratedImage, sqlx::Error> {
        let query = format!(
            "INSERT INTO generated_images \
                (generation_id, file_path, thumbnail_path, width, height, file_size, \
                 signature_turn, signature_slot) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(generation_id)
            .bind(&input.file_path)
            .bind(&input.thumbnail_path)
            .bind(input.width)
            .bind(input.height)
            .bind(input.file_size)
            .bind(input.signature_turn)
            .bind(input.signature_slot)
            .fetch_one(pool)
            .await
    }

    /// Images of a generation in creation order.
    pub async fn list_for_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<Vec<GeneratedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_images \
             WHERE generation_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(generation_id)
            .fetch_all(pool)
            .await
    }

    /// The selected image of each listed generation, where one exists.
    pub async fn list_selected_for_generations(
        pool: &PgPool,
        generation_ids: &[DbId],
    ) -> Result<Vec<GeneratedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_images \
             WHERE generation_id = ANY($1) AND is_selected"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(generation_ids)
            .fetch_all(pool)
            .await
    }

    /// Make `image_id` the only selected image of `generation_id`.
    ///
    /// Clears the previous selection and sets the new one in a single
    /// transaction. Returns `None` (and changes nothing) when the image does
    /// not belong to the generation.
    pub async fn select(
        pool: &PgPool,
        generation_id: DbId,
        image_id: DbId,
    ) -> Result<Option<GeneratedImage>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let owned: Option<(DbId,)> = sqlx::query_as(
            "SELECT id FROM generated_images WHERE id = $1 AND generation_id = $2 FOR UPDATE",
        )
        .bind(image_id)
        .bind(generation_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "UPDATE generated_images SET is_selected = FALSE \
             WHERE generation_id = $1 AND is_selected",
        )
        .bind(generation_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE generated_images SET is_selected = TRUE WHERE id = $1 RETURNING {COLUMNS}"
        );
        let image = sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(image_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(image))
    }
}
