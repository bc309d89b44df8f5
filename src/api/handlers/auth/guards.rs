//! Route guards for authenticated and role-gated endpoints.

use axum::http::HeaderMap;
use sqlx::PgPool;

use super::{error::ApiError, role::Role, session::current_user, state::AuthState, storage::User};

/// Resolve the session to its user, or fail with 401.
pub(crate) async fn require_user(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
) -> Result<User, ApiError> {
    match current_user(headers, state, pool).await? {
        Some(user) => Ok(user),
        None => Err(ApiError::Unauthenticated),
    }
}

/// `require_user`, then fail with 403 unless the role matches.
pub(crate) async fn require_role(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
    role: Role,
) -> Result<User, ApiError> {
    let user = require_user(headers, state, pool).await?;
    if user.role == role {
        Ok(user)
    } else {
        Err(ApiError::Forbidden)
    }
}
