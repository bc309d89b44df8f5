//! Cookie-backed session lifecycle and session endpoints.
//!
//! Flow Overview: the cookie carries a raw random token; only a keyed hash
//! of it reaches the session store. Anonymous sessions exist (for pending
//! OAuth flows); a session referencing a deleted user degrades back to
//! anonymous rather than failing the request.

use anyhow::{Context, Result};
use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::{
    error::ApiError,
    session_store::SessionData,
    state::{AuthConfig, AuthState},
    storage::{self, User},
    types::{MessageResponse, UserResponse},
    utils::{generate_session_token, hash_session_token},
};

const SESSION_COOKIE_NAME: &str = "voiceforge_session";

/// A request's session: raw token (for the cookie), its store key, and the
/// current data snapshot.
pub(crate) struct Session {
    token: String,
    token_hash: Vec<u8>,
    pub(crate) data: SessionData,
}

impl Session {
    /// Persist the current snapshot. This must complete before any response
    /// that assumes the write (the save-then-redirect ordering).
    pub(crate) async fn save(&self, state: &AuthState) -> Result<()> {
        state
            .sessions()
            .put(&self.token_hash, self.data.clone())
            .await
    }

    pub(crate) async fn destroy(&self, state: &AuthState) -> Result<()> {
        state.sessions().destroy(&self.token_hash).await
    }

    /// `Set-Cookie` value carrying this session's raw token.
    pub(crate) fn cookie(&self, config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
        session_cookie(config, &self.token)
    }
}

/// Resolve the request cookie to a live session, if one exists.
pub(crate) async fn resolve_session(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Option<Session>> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let token_hash = hash_session_token(state.config().session_secret(), &token);
    let data = state.sessions().get(&token_hash).await?;
    Ok(data.map(|data| Session {
        token,
        token_hash,
        data,
    }))
}

/// Resolve the request cookie, or mint a fresh anonymous session.
///
/// The new session is not persisted until the caller saves it; callers must
/// also send the returned session's cookie so the browser learns the token.
pub(crate) async fn resolve_or_create_session(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Session> {
    if let Some(session) = resolve_session(headers, state).await? {
        return Ok(session);
    }
    let token = generate_session_token()?;
    let token_hash = hash_session_token(state.config().session_secret(), &token);
    Ok(Session {
        token,
        token_hash,
        data: SessionData::default(),
    })
}

/// Promote a session to authenticated and persist it.
pub(crate) async fn attach_user(
    state: &AuthState,
    session: &mut Session,
    user_id: Uuid,
) -> Result<()> {
    session.data.user_id = Some(user_id);
    session
        .save(state)
        .await
        .context("failed to save session after attaching user")
}

/// Resolve the request to its authenticated user, if any.
///
/// A session whose user id no longer resolves is demoted to anonymous and
/// the stale reference cleared; that is never an error.
pub(crate) async fn current_user(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
) -> Result<Option<User>> {
    let Some(mut session) = resolve_session(headers, state).await? else {
        return Ok(None);
    };
    let Some(user_id) = session.data.user_id else {
        return Ok(None);
    };
    match storage::get_user(pool, user_id).await? {
        Some(user) => Ok(Some(user)),
        None => {
            session.data.user_id = None;
            session.save(state).await?;
            Ok(None)
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Authenticated session", body = UserResponse),
        (status = 401, description = "Unauthenticated", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    match current_user(&headers, &state, &pool).await {
        Ok(Some(user)) => Json(UserResponse { user: user.into() }).into_response(),
        Ok(None) => ApiError::Unauthenticated.into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    match resolve_session(&headers, &state).await {
        Ok(Some(session)) => {
            if let Err(err) = session.destroy(&state).await {
                error!("Failed to destroy session: {err}");
            }
        }
        Ok(None) => {}
        Err(err) => error!("Failed to resolve session during logout: {err}"),
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        response_headers,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
        .into_response()
}

/// Build the `HttpOnly` session cookie for a raw token.
fn session_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}
