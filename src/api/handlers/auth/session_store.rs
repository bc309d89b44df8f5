//! Session persistence behind a swappable store interface.
//!
//! Sessions are keyed by a keyed hash of the cookie token. The in-memory
//! store is the default and loses sessions on restart; the Postgres store
//! survives restarts and is selected by configuration. Both refresh the
//! TTL on every read, so the expiry window is an inactivity window.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

/// Server-side state bound to one browser cookie.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SessionData {
    /// Authenticated user, or `None` for an anonymous session.
    pub user_id: Option<Uuid>,
    /// Single-use CSRF state for a pending OAuth callback.
    pub oauth_state: Option<String>,
    /// Post-login redirect target stored alongside the OAuth state.
    pub next_path: Option<String>,
}

/// Which session store implementation the server runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Postgres,
}

impl SessionBackend {
    /// Parse a configuration value.
    ///
    /// # Errors
    /// Returns a message suitable for CLI validation on unknown values.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            other => Err(format!(
                "invalid session store '{other}' (expected 'memory' or 'postgres')"
            )),
        }
    }
}

#[async_trait]
pub(crate) trait SessionStore: Send + Sync {
    /// Fetch a live session and refresh its TTL; expired or unknown hashes
    /// return `None`.
    async fn get(&self, token_hash: &[u8]) -> Result<Option<SessionData>>;

    /// Persist a session. Callers rely on this completing before any
    /// response that depends on the write is sent.
    async fn put(&self, token_hash: &[u8], data: SessionData) -> Result<()>;

    /// Remove a session; removing an unknown session is not an error.
    async fn destroy(&self, token_hash: &[u8]) -> Result<()>;

    /// Remove expired sessions, returning how many were dropped.
    async fn sweep(&self) -> Result<u64>;
}

struct MemoryEntry {
    data: SessionData,
    expires_at: Instant,
}

/// Process-local store; the single lock serializes all read-modify-write
/// cycles, which covers the per-session ordering requirement.
pub(crate) struct MemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<Vec<u8>, MemoryEntry>>,
}

impl MemorySessionStore {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token_hash: &[u8]) -> Result<Option<SessionData>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get_mut(token_hash) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Ok(Some(entry.data.clone()))
            }
            Some(_) => {
                entries.remove(token_hash);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, token_hash: &[u8], data: SessionData) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            token_hash.to_vec(),
            MemoryEntry {
                data,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn destroy(&self, token_hash: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(token_hash);
        Ok(())
    }

    async fn sweep(&self) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

/// Database-backed store; sessions survive process restarts.
pub(crate) struct PgSessionStore {
    pool: PgPool,
    ttl_seconds: i64,
}

impl PgSessionStore {
    pub(crate) fn new(pool: PgPool, ttl_seconds: i64) -> Self {
        Self { pool, ttl_seconds }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, token_hash: &[u8]) -> Result<Option<SessionData>> {
        // Single statement: refresh the TTL and read the session atomically,
        // so concurrent reads of one session cannot interleave a stale write.
        let query = r"
            UPDATE sessions
            SET expires_at = NOW() + ($2 * INTERVAL '1 second')
            WHERE token_hash = $1
              AND expires_at > NOW()
            RETURNING user_id, oauth_state, next_path
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(self.ttl_seconds)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.map(|row| SessionData {
            user_id: row.get("user_id"),
            oauth_state: row.get("oauth_state"),
            next_path: row.get("next_path"),
        }))
    }

    async fn put(&self, token_hash: &[u8], data: SessionData) -> Result<()> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, oauth_state, next_path, expires_at)
            VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
            ON CONFLICT (token_hash) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                oauth_state = EXCLUDED.oauth_state,
                next_path = EXCLUDED.next_path,
                expires_at = EXCLUDED.expires_at
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .bind(data.user_id)
            .bind(data.oauth_state)
            .bind(data.next_path)
            .bind(self.ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save session")?;
        Ok(())
    }

    async fn destroy(&self, token_hash: &[u8]) -> Result<()> {
        // Logout is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn sweep(&self) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to sweep sessions")?;
        Ok(result.rows_affected())
    }
}

/// Background task that drops expired sessions on a fixed period.
pub(crate) fn spawn_session_sweeper(store: Arc<dyn SessionStore>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.sweep().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired sessions swept"),
                Err(err) => error!("Failed to sweep sessions: {err}"),
            }
        }
    });
}
