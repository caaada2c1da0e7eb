use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// POST /                    -> create_generation
/// GET  /{id}                -> get_generation
/// POST /{id}/select         -> select_image
/// POST /{id}/regenerate     -> regenerate
/// POST /{id}/style-copy     -> style_copy
/// POST /{id}/edit           -> edit_generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generation::create_generation))
        .route("/{id}", get(generation::get_generation))
        .route("/{id}/select", post(generation::select_image))
        .route("/{id}/regenerate", post(generation::regenerate))
        .route("/{id}/style-copy", post(generation::style_copy))
        .route("/{id}/edit", post(generation::edit_generation))
}

/// Project-scoped routes mounted at `/projects`.
pub fn project_router() -> Router<AppState> {
    Router::new().route(
        "/{id}/generations/history",
        get(generation::project_history),
    )
}
