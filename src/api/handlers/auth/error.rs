//! HTTP error taxonomy for the auth and admin surface.
//!
//! Validation failures carry the first violated rule; credential failures are
//! deliberately generic so responses cannot be used to enumerate accounts.
//! Internal failures are logged server-side and never leak detail to clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::types::MessageResponse;

#[derive(Debug)]
pub(crate) enum ApiError {
    /// Malformed input; the message names the first violated rule.
    Validation(String),
    /// Duplicate email on signup.
    Conflict(&'static str),
    /// Bad credentials; one message for every cause.
    Credentials,
    /// No authenticated session.
    Unauthenticated,
    /// Authenticated but lacking the required role.
    Forbidden,
    /// Server-side misconfiguration (e.g. OAuth credentials missing).
    Config(&'static str),
    /// Unexpected failure; logged, surfaced as an opaque 500.
    Internal(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Credentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Conflict(message) | Self::Config(message) => (*message).to_string(),
            Self::Credentials => "Invalid email or password".to_string(),
            Self::Unauthenticated => "Unauthenticated".to_string(),
            Self::Forbidden => "Admins only".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("Request failed: {err:#}");
        }
        let body = MessageResponse {
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::Validation("Name is required".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("Email already registered").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::Credentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Config("Google authentication is not configured").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Internal(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn credentials_message_is_generic() {
        // Same message whether the account is missing, the provider differs,
        // or the password is wrong.
        assert_eq!(ApiError::Credentials.message(), "Invalid email or password");
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = ApiError::Internal(anyhow!("dsn contains a password"));
        assert_eq!(err.message(), "Internal server error");
    }
}
