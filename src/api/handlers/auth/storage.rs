//! Database helpers for user records.
//!
//! Email uniqueness is enforced by the `users.email` constraint, not by a
//! check-then-insert, so concurrent signups for one email cannot both win.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::role::{Provider, Role};
use super::utils::is_unique_violation;

/// Stored user record; `password_hash` never leaves the server.
#[derive(Clone, Debug)]
pub(crate) struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub provider: Provider,
    pub provider_id: Option<String>,
    pub avatar_url: Option<String>,
    pub company: Option<String>,
    pub role: Role,
    pub created_at: String,
}

/// Fields for a new user; the id and creation timestamp are server-assigned.
#[derive(Debug)]
pub(crate) struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub provider: Provider,
    pub provider_id: Option<String>,
    pub avatar_url: Option<String>,
    pub company: Option<String>,
    pub role: Role,
}

/// Partial update; `None` keeps the stored value. The id and creation
/// timestamp are immutable and have no corresponding field.
#[derive(Debug, Default)]
pub(crate) struct UserUpdate {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub provider: Option<Provider>,
    pub provider_id: Option<String>,
    pub avatar_url: Option<String>,
    pub company: Option<String>,
    pub role: Option<Role>,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(crate) enum InsertOutcome {
    Created(User),
    DuplicateEmail,
}

const USER_COLUMNS: &str = r#"
    id, email, name, password_hash, provider, provider_id, avatar_url, company, role,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        provider: Provider::parse(row.get::<&str, _>("provider")),
        provider_id: row.get("provider_id"),
        avatar_url: row.get("avatar_url"),
        company: row.get("company"),
        role: Role::parse(row.get::<&str, _>("role")),
        created_at: row.get("created_at"),
    }
}

pub(crate) async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(user_from_row))
}

/// Look up by email; callers pass the normalized (lowercased) form.
pub(crate) async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn create_user(pool: &PgPool, new_user: NewUser) -> Result<InsertOutcome> {
    let query = format!(
        r"
        INSERT INTO users (email, name, password_hash, provider, provider_id, avatar_url, company, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {USER_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.provider.as_str())
        .bind(&new_user.provider_id)
        .bind(&new_user.avatar_url)
        .bind(&new_user.company)
        .bind(new_user.role.as_str())
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(user_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::DuplicateEmail),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Merge the given fields into an existing record.
///
/// Returns `None` when the id does not exist; callers treat that as a
/// data-integrity bug, not user error.
pub(crate) async fn update_user(
    pool: &PgPool,
    id: Uuid,
    update: UserUpdate,
) -> Result<Option<User>> {
    let query = format!(
        r"
        UPDATE users
        SET name = COALESCE($2, name),
            password_hash = COALESCE($3, password_hash),
            provider = COALESCE($4, provider),
            provider_id = COALESCE($5, provider_id),
            avatar_url = COALESCE($6, avatar_url),
            company = COALESCE($7, company),
            role = COALESCE($8, role)
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .bind(&update.name)
        .bind(&update.password_hash)
        .bind(update.provider.map(Provider::as_str))
        .bind(&update.provider_id)
        .bind(&update.avatar_url)
        .bind(&update.company)
        .bind(update.role.map(Role::as_str))
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update user")?;
    Ok(row.as_ref().map(user_from_row))
}

/// All users, for the admin directory view.
pub(crate) async fn list_users(pool: &PgPool) -> Result<Vec<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;
    Ok(rows.iter().map(user_from_row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(
            format!("{:?}", InsertOutcome::DuplicateEmail),
            "DuplicateEmail"
        );
    }

    #[test]
    fn user_update_default_keeps_everything() {
        let update = UserUpdate::default();
        assert!(update.name.is_none());
        assert!(update.password_hash.is_none());
        assert!(update.provider.is_none());
        assert!(update.provider_id.is_none());
        assert!(update.avatar_url.is_none());
        assert!(update.company.is_none());
        assert!(update.role.is_none());
    }
}
