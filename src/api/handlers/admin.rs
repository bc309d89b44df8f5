//! Admin directory endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the request via session cookie.
//! 2) Enforce the admin role.
//! 3) Return the user directory with credential fields stripped.

use axum::{Json, extract::Extension, http::HeaderMap, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::auth::{
    AuthState,
    error::ApiError,
    guards::require_role,
    role::Role,
    storage,
    types::{PublicUser, UsersResponse},
};

#[utoipa::path(
    get,
    path = "/admin/profiles",
    responses(
        (status = 200, description = "All user profiles", body = UsersResponse),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 403, description = "Admins only.")
    ),
    tag = "admin"
)]
pub async fn profiles(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(err) = require_role(&headers, &state, &pool, Role::Admin).await {
        return err.into_response();
    }

    match storage::list_users(&pool).await {
        Ok(users) => Json(UsersResponse {
            users: users.into_iter().map(PublicUser::from).collect(),
        })
        .into_response(),
        Err(err) => {
            error!("Failed to list users: {err}");
            ApiError::Internal(err).into_response()
        }
    }
}
