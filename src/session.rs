use crate::error::{AppError, Result};
use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use uuid::Uuid;

/// Name of the cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "sid";

/// Session
///
/// A login attached to an opaque id. Only the id ever leaves the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub sid: String,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn issue(user_id: i32, ttl: Duration) -> Result<Self> {
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal(format!("session ttl {ttl} overflows")))?;
        Ok(Self {
            sid: Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at,
        })
    }
}

/// SessionStore Trait
///
/// Process-wide session storage keyed by session id. Expired sessions behave exactly
/// like missing ones.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Opens a session for `user_id` and returns it.
    async fn create(&self, user_id: i32) -> Result<Session>;
    /// Resolves a live session id to its user id.
    async fn resolve(&self, sid: &str) -> Result<Option<i32>>;
    /// Ends a session. Unknown ids are ignored.
    async fn destroy(&self, sid: &str) -> Result<()>;
    /// Deletes expired sessions and returns how many were removed.
    async fn prune_expired(&self) -> Result<u64>;
}

/// SessionState
///
/// The concrete type used to share the session store across the application state.
pub type SessionState = Arc<dyn SessionStore>;

/// PostgresSessionStore
///
/// Keeps sessions in the same database as the records, in a `sessions` table that is
/// created on first run if missing.
pub struct PostgresSessionStore {
    pool: PgPool,
    ttl: Duration,
}

impl PostgresSessionStore {
    pub async fn new(pool: PgPool, ttl: Duration) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                sid TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS sessions_expires_at_idx ON sessions (expires_at)")
            .execute(&pool)
            .await?;

        Ok(Self { pool, ttl })
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(&self, user_id: i32) -> Result<Session> {
        let session = Session::issue(user_id, self.ttl)?;
        sqlx::query("INSERT INTO sessions (sid, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.sid)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("session create error: {:?}", e))?;
        Ok(session)
    }

    async fn resolve(&self, sid: &str) -> Result<Option<i32>> {
        let user_id = sqlx::query_scalar::<_, i32>(
            "SELECT user_id FROM sessions WHERE sid = $1 AND expires_at > NOW()",
        )
        .bind(sid)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("session resolve error: {:?}", e))?;
        Ok(user_id)
    }

    async fn destroy(&self, sid: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE sid = $1")
            .bind(sid)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("session destroy error: {:?}", e))?;
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// InMemorySessionStore
///
/// Session store for tests and database-less runs.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: i32) -> Result<Session> {
        let session = Session::issue(user_id, self.ttl)?;
        self.lock().insert(session.sid.clone(), session.clone());
        Ok(session)
    }

    async fn resolve(&self, sid: &str) -> Result<Option<i32>> {
        let now = Utc::now();
        Ok(self
            .lock()
            .get(sid)
            .filter(|s| s.expires_at > now)
            .map(|s| s.user_id))
    }

    async fn destroy(&self, sid: &str) -> Result<()> {
        self.lock().remove(sid);
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

/// Builds the browser-session cookie for `sid` (no Max-Age, so it dies with the browser).
pub fn session_cookie(sid: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, sid))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Cookie used to clear the session cookie on logout.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
