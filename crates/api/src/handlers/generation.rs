//! Handlers for generation requests: submit, poll, select, regenerate,
//! style copy, partial edit and project history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mockup_core::options::RawGenerationOptions;
use mockup_core::types::DbId;
use mockup_pipeline::dispatcher::{CreateGeneration, EditRequest, StyleCopyRequest};
use mockup_pipeline::views::{GenerationView, HistoryPage, ImageView};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectImageRequest {
    pub image_id: DbId,
}

/// Body of a regenerate call. Absent options reuse the stored ones as-is.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// `?page=&limit=` for the history listing.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /generations
pub async fn create_generation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateGeneration>,
) -> AppResult<(StatusCode, Json<DataResponse<GenerationView>>)> {
    let generation = state.dispatcher.submit(user.user_id, input).await?;
    let view = GenerationView::build(generation, Vec::new())?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// GET /generations/{id}
pub async fn get_generation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<GenerationView>>> {
    let view = state.dispatcher.status(user.user_id, id).await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /generations/{id}/select
pub async fn select_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<SelectImageRequest>,
) -> AppResult<Json<DataResponse<ImageView>>> {
    let image = state
        .dispatcher
        .select_image(user.user_id, id, input.image_id)
        .await?;
    Ok(Json(DataResponse { data: image }))
}

/// POST /generations/{id}/regenerate
pub async fn regenerate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    body: Option<Json<RegenerateRequest>>,
) -> AppResult<(StatusCode, Json<DataResponse<GenerationView>>)> {
    let overrides = match body.and_then(|Json(b)| b.options) {
        Some(value) => RawGenerationOptions::from_json(value)?,
        None => RawGenerationOptions::default(),
    };

    let generation = state
        .dispatcher
        .regenerate(user.user_id, id, overrides)
        .await?;
    let view = GenerationView::build(generation, Vec::new())?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// POST /generations/{id}/style-copy
pub async fn style_copy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<StyleCopyRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<GenerationView>>)> {
    let generation = state.dispatcher.style_copy(user.user_id, id, input).await?;
    let view = GenerationView::build(generation, Vec::new())?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// POST /generations/{id}/edit
pub async fn edit_generation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<EditRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<GenerationView>>)> {
    let generation = state.dispatcher.edit(user.user_id, id, input).await?;
    let view = GenerationView::build(generation, Vec::new())?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// GET /projects/{id}/generations/history
pub async fn project_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<DataResponse<HistoryPage>>> {
    let page = state
        .dispatcher
        .project_history(user.user_id, project_id, params.page, params.limit)
        .await?;
    Ok(Json(DataResponse { data: page }))
}
