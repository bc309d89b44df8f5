//! Local (password) signup and login endpoints.
//!
//! Flow Overview:
//! 1) Validate the payload, surfacing the first violated rule.
//! 2) Touch the credential store (uniqueness enforced there, not here).
//! 3) Save the session, then respond with the public user view.
//!
//! The key derivation is deliberately slow, so it runs on the blocking pool
//! instead of a request worker.

use anyhow::{Context, Result, anyhow};
use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::{
    error::ApiError,
    password,
    role::{Provider, Role},
    session::{Session, attach_user, resolve_or_create_session},
    state::AuthState,
    storage::{self, InsertOutcome, NewUser, User, UserUpdate},
    types::{LoginRequest, MessageResponse, SignupRequest, UserResponse},
    utils::{normalize_email, valid_email},
};

const MIN_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 8;
const MAX_COMPANY_CHARS: usize = 120;

struct ValidSignup {
    name: String,
    email: String,
    password: String,
    company: Option<String>,
}

/// Check signup fields in order, returning the first violated rule.
fn validate_signup(request: &SignupRequest) -> Result<ValidSignup, ApiError> {
    let name = request.name.trim();
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(ApiError::Validation("Name is required".to_string()));
    }

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Valid email required".to_string()));
    }

    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let company = request
        .company
        .as_deref()
        .map(str::trim)
        .filter(|company| !company.is_empty());
    if company.is_some_and(|company| company.chars().count() > MAX_COMPANY_CHARS) {
        return Err(ApiError::Validation(
            "Company must be at most 120 characters".to_string(),
        ));
    }

    Ok(ValidSignup {
        name: name.to_string(),
        email,
        password: request.password.clone(),
        company: company.map(str::to_string),
    })
}

/// Decode a JSON body; anything unparseable is a plain validation error so
/// the client always gets the same 400 shape.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::Validation("Missing payload".to_string()));
    }
    serde_json::from_slice(body).map_err(|_| ApiError::Validation("Invalid input".to_string()))
}

fn validate_login(request: &LoginRequest) -> Result<(String, String), ApiError> {
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Valid email required".to_string()));
    }
    if request.password.is_empty() {
        return Err(ApiError::Validation("Password is required".to_string()));
    }
    Ok((email, request.password.clone()))
}

/// Password login is only valid for `local` accounts; a Google account never
/// matches, even if a stale credential string is still stored.
fn credentials_match(provider: Provider, stored: Option<&str>, password: &str) -> bool {
    provider == Provider::Local && password::verify(password, stored)
}

/// 200 response carrying the public user view plus the session cookie.
fn user_response(state: &AuthState, session: &Session, user: User) -> Result<Response> {
    let cookie = session
        .cookie(state.config())
        .context("failed to build session cookie")?;
    let mut response = Json(UserResponse { user: user.into() }).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation error", body = MessageResponse),
        (status = 409, description = "Email already registered", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    body: Bytes,
) -> Response {
    let request: SignupRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    match handle_signup(&headers, &state, &pool, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_signup(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
    request: &SignupRequest,
) -> Result<Response, ApiError> {
    let valid = validate_signup(request)?;

    let role = state.config().admin_emails().role_for_email(&valid.email);
    let password = valid.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash(&password))
        .await
        .context("password hashing task failed")??;

    let user = match storage::create_user(
        pool,
        NewUser {
            email: valid.email,
            name: valid.name,
            password_hash: Some(password_hash),
            provider: Provider::Local,
            provider_id: None,
            avatar_url: None,
            company: valid.company,
            role,
        },
    )
    .await?
    {
        InsertOutcome::Created(user) => user,
        InsertOutcome::DuplicateEmail => {
            return Err(ApiError::Conflict("Email already registered"));
        }
    };

    info!(user_id = %user.id, "account created");

    let mut session = resolve_or_create_session(headers, state).await?;
    attach_user(state, &mut session, user.id).await?;
    Ok(user_response(state, &session, user)?)
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = UserResponse),
        (status = 400, description = "Validation error", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    body: Bytes,
) -> Response {
    let request: LoginRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    match handle_login(&headers, &state, &pool, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_login(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
    request: &LoginRequest,
) -> Result<Response, ApiError> {
    let (email, password) = validate_login(request)?;

    // One generic rejection for "no such user", "not a password account" and
    // "wrong password": responses must not reveal which one happened.
    let Some(user) = storage::get_user_by_email(pool, &email).await? else {
        return Err(ApiError::Credentials);
    };

    let provider = user.provider;
    let stored = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || credentials_match(provider, stored.as_deref(), &password))
            .await
            .context("password verification task failed")?;
    if !verified {
        return Err(ApiError::Credentials);
    }

    // The allow-list may have changed since the account was created; re-sync
    // the role on every login.
    let desired_role = state.config().admin_emails().role_for_email(&email);
    let user = sync_role(pool, user, desired_role).await?;

    let mut session = resolve_or_create_session(headers, state).await?;
    attach_user(state, &mut session, user.id).await?;
    Ok(user_response(state, &session, user)?)
}

/// Persist a re-derived role when it differs from the stored one.
pub(super) async fn sync_role(pool: &PgPool, user: User, desired: Role) -> Result<User> {
    if user.role == desired {
        return Ok(user);
    }
    storage::update_user(
        pool,
        user.id,
        UserUpdate {
            role: Some(desired),
            ..UserUpdate::default()
        },
    )
    .await?
    .ok_or_else(|| anyhow!("user {} vanished during role update", user.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(name: &str, email: &str, password: &str, company: Option<&str>) -> SignupRequest {
        SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            company: company.map(str::to_string),
        }
    }

    fn first_violation(request: &SignupRequest) -> Option<String> {
        match validate_signup(request) {
            Ok(_) => None,
            Err(ApiError::Validation(message)) => Some(message),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_signup_accepts_and_normalizes() {
        let valid = validate_signup(&signup("  Ana ", "Ana@X.com", "longenough1", None))
            .expect("signup should validate");
        assert_eq!(valid.name, "Ana");
        assert_eq!(valid.email, "ana@x.com");
        assert!(valid.company.is_none());
    }

    #[test]
    fn validate_signup_surfaces_first_violation() {
        assert_eq!(
            first_violation(&signup("A", "bad-email", "short", None)),
            Some("Name is required".to_string())
        );
        assert_eq!(
            first_violation(&signup("Ana", "bad-email", "short", None)),
            Some("Valid email required".to_string())
        );
        assert_eq!(
            first_violation(&signup("Ana", "ana@x.com", "short", None)),
            Some("Password must be at least 8 characters".to_string())
        );
        let long_company = "x".repeat(121);
        assert_eq!(
            first_violation(&signup(
                "Ana",
                "ana@x.com",
                "longenough1",
                Some(&long_company)
            )),
            Some("Company must be at most 120 characters".to_string())
        );
    }

    #[test]
    fn validate_signup_blank_company_becomes_none() {
        let valid = validate_signup(&signup("Ana", "ana@x.com", "longenough1", Some("   ")))
            .expect("signup should validate");
        assert!(valid.company.is_none());
    }

    #[test]
    fn parse_body_flags_missing_and_malformed_payloads() {
        let missing = parse_body::<SignupRequest>(&Bytes::new());
        assert!(matches!(
            missing,
            Err(ApiError::Validation(message)) if message == "Missing payload"
        ));

        let malformed = parse_body::<SignupRequest>(&Bytes::from_static(b"{not json"));
        assert!(matches!(
            malformed,
            Err(ApiError::Validation(message)) if message == "Invalid input"
        ));

        let parsed: LoginRequest =
            parse_body(&Bytes::from_static(br#"{"email":"a@b.co","password":"pw"}"#))
                .expect("valid body should parse");
        assert_eq!(parsed.email, "a@b.co");
    }

    #[test]
    fn validate_login_normalizes_email() {
        let (email, password) = validate_login(&LoginRequest {
            email: " Ana@X.com ".to_string(),
            password: "secret".to_string(),
        })
        .expect("login should validate");
        assert_eq!(email, "ana@x.com");
        assert_eq!(password, "secret");
    }

    #[test]
    fn google_accounts_never_match_a_password() {
        // Even a credential that would verify is rejected on provider
        // mismatch, and the absence of a credential does not panic.
        let stored = password::hash("longenough1").expect("hash should succeed");
        assert!(credentials_match(
            Provider::Local,
            Some(&stored),
            "longenough1"
        ));
        assert!(!credentials_match(
            Provider::Google,
            Some(&stored),
            "longenough1"
        ));
        assert!(!credentials_match(Provider::Google, None, "longenough1"));
        assert!(!credentials_match(Provider::Local, None, "longenough1"));
    }

    #[test]
    fn validate_login_rejects_bad_input() {
        assert!(matches!(
            validate_login(&LoginRequest {
                email: "nope".to_string(),
                password: "secret".to_string(),
            }),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_login(&LoginRequest {
                email: "ana@x.com".to_string(),
                password: String::new(),
            }),
            Err(ApiError::Validation(_))
        ));
    }
}
