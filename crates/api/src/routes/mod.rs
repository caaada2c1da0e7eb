pub mod generation;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /generations                                     submit (POST)
/// /generations/{id}                                status (GET)
/// /generations/{id}/select                         select image (POST)
/// /generations/{id}/regenerate                     regenerate (POST)
/// /generations/{id}/style-copy                     style copy (POST)
///
/// /projects/{id}/generations/history               completed history (GET)
/// ```
///
/// Every route requires a Bearer token.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generations", generation::router())
        .nest("/projects", generation::project_router())
}
