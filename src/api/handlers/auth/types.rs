//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::storage::User;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub company: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User record safe to serialize to a client: the password credential is
/// stripped when converting from the stored record.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
    pub provider_id: Option<String>,
    pub avatar_url: Option<String>,
    pub company: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            name: user.name,
            provider: user.provider.as_str().to_string(),
            provider_id: user.provider_id,
            avatar_url: user.avatar_url,
            company: user.company,
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UsersResponse {
    pub users: Vec<PublicUser>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::role::{Provider, Role};
    use anyhow::{Context, Result};
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::nil(),
            email: "ana@x.com".to_string(),
            name: "Ana".to_string(),
            password_hash: Some("salt:key".to_string()),
            provider: Provider::Local,
            provider_id: None,
            avatar_url: None,
            company: Some("Acme".to_string()),
            role: Role::User,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn public_user_strips_the_password_credential() -> Result<()> {
        let public = PublicUser::from(sample_user());
        let value = serde_json::to_value(&public)?;
        let object = value.as_object().context("expected JSON object")?;
        assert!(!object.contains_key("password_hash"));
        assert_eq!(
            object.get("email").and_then(serde_json::Value::as_str),
            Some("ana@x.com")
        );
        assert_eq!(
            object.get("provider").and_then(serde_json::Value::as_str),
            Some("local")
        );
        Ok(())
    }

    #[test]
    fn signup_request_round_trips() -> Result<()> {
        let request = SignupRequest {
            name: "Ana".to_string(),
            email: "Ana@X.com".to_string(),
            password: "longenough1".to_string(),
            company: None,
        };
        let value = serde_json::to_value(&request)?;
        let decoded: SignupRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.email, "Ana@X.com");
        assert!(decoded.company.is_none());
        Ok(())
    }
}
