//! Caller identity for generation handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use mockup_core::error::CoreError;
use mockup_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

/// The caller, identified by the account service's user id. Every
/// ownership check in the dispatcher runs against `user_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let user_id = state.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            unauthorized(e.to_string())
        })?;
        Ok(AuthUser { user_id })
    }
}

/// The token of an `Authorization: Bearer <token>` header. The scheme is
/// matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Malformed Authorization header"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(unauthorized("Expected a Bearer token")),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.into()))
}
