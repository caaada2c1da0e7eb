use std::sync::Arc;

use mockup_pipeline::dispatcher::JobDispatcher;

use crate::auth::jwt::TokenVerifier;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<JobDispatcher>,
    pub tokens: Arc<TokenVerifier>,
    /// Database pool for health probes. `None` when the dispatcher runs on
    /// in-memory stores.
    pub pool: Option<mockup_db::DbPool>,
}
