//! Google OAuth endpoints: authorization redirect and callback.
//!
//! Flow Overview:
//! 1) `/auth/google` stores a fresh CSRF state (and the post-login path) in
//!    the session, saves it, then redirects to the provider.
//! 2) `/auth/google/callback` validates the returned state against the
//!    session before any network call; the stored state is single-use.
//! 3) The code is exchanged server-to-server, the profile fetched, and the
//!    user linked or created; failures degrade to a login-page redirect
//!    because the browser is mid-navigation.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    http::{
        HeaderMap, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use url::Url;

use super::{
    error::ApiError,
    local::sync_role,
    role::Provider,
    session::{attach_user, resolve_or_create_session, resolve_session},
    state::{AuthConfig, AuthState, DEFAULT_NEXT_PATH},
    storage::{self, InsertOutcome, NewUser, User, UserUpdate},
    types::MessageResponse,
    utils::normalize_email,
};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const OAUTH_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenID userinfo fields consumed from the provider.
#[derive(Debug, Deserialize)]
pub(super) struct GoogleProfile {
    pub(super) sub: String,
    pub(super) email: String,
    pub(super) name: Option<String>,
    pub(super) picture: Option<String>,
}

/// Why a callback was rejected before (or instead of) the token exchange.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum CallbackRejection {
    NotConfigured,
    MissingCode,
    StateMismatch,
}

impl CallbackRejection {
    /// Error code carried to the login page query string.
    pub(super) const fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "google_config",
            Self::MissingCode => "google_code",
            Self::StateMismatch => "google_state",
        }
    }
}

/// Validate callback inputs; no network traffic may happen before this.
///
/// `stored_state` is the single-use value the session held; the caller has
/// already consumed it, so a retry of the same callback cannot pass again.
pub(super) fn validate_callback(
    configured: bool,
    code: Option<&str>,
    state: Option<&str>,
    stored_state: Option<&str>,
) -> Result<String, CallbackRejection> {
    if !configured {
        return Err(CallbackRejection::NotConfigured);
    }
    let code = code
        .filter(|code| !code.is_empty())
        .ok_or(CallbackRejection::MissingCode)?;
    match (state, stored_state) {
        (Some(given), Some(expected)) if !given.is_empty() && given == expected => {
            Ok(code.to_string())
        }
        _ => Err(CallbackRejection::StateMismatch),
    }
}

/// Only site-local paths are allowed as post-login targets.
fn sanitize_next_path(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => DEFAULT_NEXT_PATH.to_string(),
    }
}

fn redirect_response(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

fn login_error_redirect(code: &str) -> Response {
    redirect_response(&format!("/auth/login?error={code}"))
}

/// Build the provider authorization URL with a fresh CSRF token.
fn authorization_request(config: &AuthConfig, client_id: &str) -> Result<(Url, CsrfToken)> {
    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string()).context("invalid auth url")?)
        .set_redirect_uri(
            RedirectUrl::new(config.google_redirect_uri().to_string())
                .context("invalid redirect uri")?,
        );

    let (url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .add_extra_param("prompt", "select_account")
        .add_extra_param("access_type", "offline")
        .url();

    Ok((url, csrf_token))
}

/// Exchange the authorization code and fetch the userinfo profile.
///
/// No retries: a failed call surfaces immediately as a redirect-with-error.
async fn exchange_code_for_profile(config: &AuthConfig, code: &str) -> Result<GoogleProfile> {
    let client_id = config
        .google_client_id()
        .context("Google client id missing")?;
    let client_secret = config
        .google_client_secret()
        .context("Google client secret missing")?;

    let oauth_client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_client_secret(ClientSecret::new(client_secret.expose_secret().to_string()))
        .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).context("invalid token url")?)
        .set_redirect_uri(
            RedirectUrl::new(config.google_redirect_uri().to_string())
                .context("invalid redirect uri")?,
        );

    let http_client = reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(OAUTH_HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("failed to build OAuth HTTP client")?;

    let token = oauth_client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(&http_client)
        .await
        .context("failed to exchange authorization code")?;

    let profile: GoogleProfile = http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token.access_token().secret())
        .send()
        .await
        .context("failed to fetch Google profile")?
        .error_for_status()
        .context("Google profile request rejected")?
        .json()
        .await
        .context("failed to parse Google profile")?;

    Ok(profile)
}

/// Link the profile to an existing user by email, or create a new one.
///
/// An existing account is claimed by the Google identity: provider fields
/// and profile data are refreshed and the role re-derived.
async fn upsert_google_user(
    state: &AuthState,
    pool: &PgPool,
    profile: &GoogleProfile,
) -> Result<User> {
    let email = normalize_email(&profile.email);
    let role = state.config().admin_emails().role_for_email(&email);

    if let Some(existing) = storage::get_user_by_email(pool, &email).await? {
        let user = storage::update_user(
            pool,
            existing.id,
            UserUpdate {
                name: profile.name.clone(),
                provider: Some(Provider::Google),
                provider_id: Some(profile.sub.clone()),
                avatar_url: profile.picture.clone(),
                ..UserUpdate::default()
            },
        )
        .await?
        .with_context(|| format!("user {} vanished during Google link", existing.id))?;
        return sync_role(pool, user, role).await;
    }

    let display_name = profile.name.clone().unwrap_or_else(|| email.clone());
    match storage::create_user(
        pool,
        NewUser {
            email: email.clone(),
            name: display_name,
            password_hash: None,
            provider: Provider::Google,
            provider_id: Some(profile.sub.clone()),
            avatar_url: profile.picture.clone(),
            company: None,
            role,
        },
    )
    .await?
    {
        InsertOutcome::Created(user) => Ok(user),
        // Lost a race with a concurrent signup for the same email; the
        // record exists now, so fall back to the lookup.
        InsertOutcome::DuplicateEmail => storage::get_user_by_email(pool, &email)
            .await?
            .context("user disappeared after duplicate insert"),
    }
}

#[derive(Debug, Deserialize)]
pub struct GoogleAuthQuery {
    pub next: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/google",
    params(
        ("next" = Option<String>, Query, description = "Post-login redirect path")
    ),
    responses(
        (status = 302, description = "Redirect to the provider"),
        (status = 500, description = "Provider not configured", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn google_auth(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    Query(query): Query<GoogleAuthQuery>,
) -> Response {
    match handle_google_auth(&headers, &state, query.next.as_deref()).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_google_auth(
    headers: &HeaderMap,
    state: &AuthState,
    next: Option<&str>,
) -> Result<Response, ApiError> {
    let Some(client_id) = state.config().google_client_id() else {
        return Err(ApiError::Config("Google authentication is not configured"));
    };

    let (authorize_url, csrf_token) = authorization_request(state.config(), client_id)?;

    let mut session = resolve_or_create_session(headers, state).await?;
    session.data.oauth_state = Some(csrf_token.secret().clone());
    session.data.next_path = Some(sanitize_next_path(next));
    // The session must be durably saved before the redirect leaves the
    // server, or the callback may race an empty session.
    session.save(state).await?;

    let mut response = redirect_response(authorize_url.as_str());
    if let Ok(cookie) = session.cookie(state.config()) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "CSRF state token")
    ),
    responses(
        (status = 302, description = "Redirect to the stored next path, or to the login page with an error code")
    ),
    tag = "auth"
)]
pub async fn google_callback(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    let configured = state.config().google_client_id().is_some()
        && state.config().google_client_secret().is_some();

    // Pull the single-use state (and next path) out of the session before
    // validation; it is consumed whether or not the comparison succeeds.
    let mut session = match resolve_session(&headers, &state).await {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to resolve session during OAuth callback: {err}");
            return login_error_redirect("google");
        }
    };
    let stored_state = session
        .as_mut()
        .and_then(|session| session.data.oauth_state.take());
    let next_path = session
        .as_mut()
        .and_then(|session| session.data.next_path.take());
    if let Some(session) = &session {
        if let Err(err) = session.save(&state).await {
            error!("Failed to persist consumed OAuth state: {err}");
            return login_error_redirect("google");
        }
    }

    let code = match validate_callback(
        configured,
        query.code.as_deref(),
        query.state.as_deref(),
        stored_state.as_deref(),
    ) {
        Ok(code) => code,
        Err(rejection) => return login_error_redirect(rejection.error_code()),
    };

    let profile = match exchange_code_for_profile(state.config(), &code).await {
        Ok(profile) => profile,
        Err(err) => {
            error!("Google auth failed: {err:#}");
            return login_error_redirect("google");
        }
    };

    let user = match upsert_google_user(&state, &pool, &profile).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to persist Google user: {err:#}");
            return login_error_redirect("google");
        }
    };

    // Attach to the existing session, or mint one if the browser lost its
    // cookie between initiate and callback.
    let mut session = match session {
        Some(session) => session,
        None => match resolve_or_create_session(&headers, &state).await {
            Ok(session) => session,
            Err(err) => {
                error!("Failed to create session during OAuth callback: {err}");
                return login_error_redirect("google");
            }
        },
    };
    if let Err(err) = attach_user(&state, &mut session, user.id).await {
        error!("Failed to save session during OAuth callback: {err}");
        return login_error_redirect("google");
    }

    let next = next_path.unwrap_or_else(|| DEFAULT_NEXT_PATH.to_string());
    let mut response = redirect_response(&next);
    if let Ok(cookie) = session.cookie(state.config()) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_callback_checks_config_first() {
        let result = validate_callback(false, Some("code"), Some("state"), Some("state"));
        assert_eq!(result, Err(CallbackRejection::NotConfigured));
    }

    #[test]
    fn validate_callback_requires_a_code() {
        assert_eq!(
            validate_callback(true, None, Some("state"), Some("state")),
            Err(CallbackRejection::MissingCode)
        );
        assert_eq!(
            validate_callback(true, Some(""), Some("state"), Some("state")),
            Err(CallbackRejection::MissingCode)
        );
    }

    #[test]
    fn validate_callback_rejects_state_mismatch_without_network() {
        // This path involves no client at all, so a mismatched state can
        // never reach the token endpoint.
        assert_eq!(
            validate_callback(true, Some("code"), Some("forged"), Some("expected")),
            Err(CallbackRejection::StateMismatch)
        );
        assert_eq!(
            validate_callback(true, Some("code"), None, Some("expected")),
            Err(CallbackRejection::StateMismatch)
        );
        assert_eq!(
            validate_callback(true, Some("code"), Some("state"), None),
            Err(CallbackRejection::StateMismatch)
        );
        assert_eq!(
            validate_callback(true, Some("code"), Some(""), Some("")),
            Err(CallbackRejection::StateMismatch)
        );
    }

    #[test]
    fn validate_callback_accepts_matching_state() {
        assert_eq!(
            validate_callback(true, Some("the-code"), Some("state"), Some("state")),
            Ok("the-code".to_string())
        );
    }

    #[test]
    fn rejection_error_codes_match_login_page_contract() {
        assert_eq!(
            CallbackRejection::NotConfigured.error_code(),
            "google_config"
        );
        assert_eq!(CallbackRejection::MissingCode.error_code(), "google_code");
        assert_eq!(CallbackRejection::StateMismatch.error_code(), "google_state");
    }

    #[test]
    fn sanitize_next_path_keeps_local_paths_only() {
        assert_eq!(sanitize_next_path(Some("/studio/voices")), "/studio/voices");
        assert_eq!(sanitize_next_path(Some("https://evil.test")), "/studio");
        assert_eq!(sanitize_next_path(Some("//evil.test")), "/studio");
        assert_eq!(sanitize_next_path(None), "/studio");
    }

    #[test]
    fn authorization_request_targets_google_with_scopes() -> Result<()> {
        let config = AuthConfig::new("http://localhost:5000".to_string());
        let (url, csrf_token) = authorization_request(&config, "client-id")?;

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("client-id"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("scope"), Some("openid email profile"));
        assert_eq!(get("prompt"), Some("select_account"));
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("state"), Some(csrf_token.secret().as_str()));
        assert_eq!(
            get("redirect_uri"),
            Some("http://localhost:5000/auth/google/callback")
        );
        Ok(())
    }

    #[test]
    fn fresh_csrf_tokens_differ() -> Result<()> {
        let config = AuthConfig::new("http://localhost:5000".to_string());
        let (_, first) = authorization_request(&config, "client-id")?;
        let (_, second) = authorization_request(&config, "client-id")?;
        assert_ne!(first.secret(), second.secret());
        Ok(())
    }

    #[test]
    fn google_profile_parses_userinfo_shape() -> Result<()> {
        let profile: GoogleProfile = serde_json::from_value(serde_json::json!({
            "sub": "10987",
            "email": "Ana@X.com",
            "name": "Ana",
            "picture": "https://lh3.example/photo.jpg"
        }))?;
        assert_eq!(profile.sub, "10987");
        assert_eq!(normalize_email(&profile.email), "ana@x.com");

        // name and picture are optional in the userinfo response.
        let minimal: GoogleProfile = serde_json::from_value(serde_json::json!({
            "sub": "1",
            "email": "a@b.co"
        }))?;
        assert!(minimal.name.is_none());
        assert!(minimal.picture.is_none());
        Ok(())
    }
}
