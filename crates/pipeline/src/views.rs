//! Read models returned to callers.

use mockup_core::generation::GenerationMode;
use mockup_core::options::GenerationOptions;
use mockup_core::types::{DbId, Timestamp};
use mockup_db::models::generation::Generation;
use mockup_db::models::image::GeneratedImage;
use mockup_db::models::status::GenerationStatus;
use serde::Serialize;

use crate::error::PipelineError;

/// Default history page size.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest history page a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: DbId,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    pub is_selected: bool,
    pub width: i32,
    pub height: i32,
}

impl From<GeneratedImage> for ImageView {
    fn from(image: GeneratedImage) -> Self {
        Self {
            id: image.id,
            file_path: image.file_path,
            thumbnail_path: image.thumbnail_path,
            is_selected: image.is_selected,
            width: image.width,
            height: image.height,
        }
    }
}

/// Status of one request, as polled by the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationView {
    pub id: DbId,
    pub project_id: DbId,
    pub status: GenerationStatus,
    pub mode: GenerationMode,
    pub options: GenerationOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_generation_id: Option<DbId>,
    /// Set when this request is a partial edit of another one's image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_from_generation_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    pub images: Vec<ImageView>,
}

impl GenerationView {
    pub fn build(generation: Generation, images: Vec<GeneratedImage>) -> Result<Self, PipelineError> {
        Ok(Self {
            id: generation.id,
            project_id: generation.project_id,
            status: generation.status()?,
            mode: generation.mode()?,
            options: generation.options()?,
            parent_generation_id: generation.parent_generation_id,
            edited_from_generation_id: generation.inputs()?.edit.map(|e| e.source_generation_id),
            error_message: generation.error_message,
            created_at: generation.created_at,
            completed_at: generation.completed_at,
            images: images.into_iter().map(ImageView::from).collect(),
        })
    }
}

/// One completed request in a project's history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: DbId,
    pub mode: GenerationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<DbId>,
    pub created_at: Timestamp,
    pub selected_image: Option<ImageView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    /// Clamp raw query values: page >= 1, limit in `1..=MAX_PAGE_LIMIT`.
    pub fn normalize(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        (page, limit)
    }

    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub pagination: Pagination,
}
