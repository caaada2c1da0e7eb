//! Repository for the `continuation_signatures` table.

use mockup_core::signature::ThoughtSignatures;
use mockup_core::types::DbId;
use sqlx::PgPool;

use crate::models::signature::ContinuationSignature;

/// Column list for `continuation_signatures` queries.
const COLUMNS: &str = "\
    id, generation_id, turn_index, text_signature, image_signatures, created_at";

/// Provides persistence for continuation signatures.
pub struct SignatureRepo;

impl SignatureRepo {
    /// Append one response's signatures as the next turn of a generation.
    pub async fn append(
        pool: &PgPool,
        generation_id: DbId,
        signatures: &ThoughtSignatures,
    ) -> Result<ContinuationSignature, sqlx::Error> {
        let query = format!(
            "INSERT INTO continuation_signatures \
                (generation_id, turn_index, text_signature, image_signatures) \
             SELECT $1, COALESCE(MAX(turn_index) + 1, 0), $2, $3 \
             FROM continuation_signatures WHERE generation_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContinuationSignature>(&query)
            .bind(generation_id)
            .bind(&signatures.text_signature)
            .bind(&signatures.image_signatures)
            .fetch_one(pool)
            .await
    }

    /// All turns of a generation in order.
    pub async fn list_for_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<Vec<ContinuationSignature>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM continuation_signatures \
             WHERE generation_id = $1 ORDER BY turn_index ASC"
        );
        sqlx::query_as::<_, ContinuationSignature>(&query)
            .bind(generation_id)
            .fetch_all(pool)
            .await
    }

    pub async fn exists_for_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM continuation_signatures WHERE generation_id = $1)",
        )
        .bind(generation_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
