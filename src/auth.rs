use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, Result},
    models::Role,
    repository::RepositoryState,
    session::{SESSION_COOKIE, SessionState},
};

/// Header accepted in `Env::Local` with `dev_auth_bypass` on, to act as an existing
/// user without logging in.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request: the user's id and role.
/// Handlers pass it to the authorization policy rather than comparing roles inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

/// Pulls the session id from the `sid` cookie, falling back to `Authorization: Bearer <sid>`.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|sid| !sid.is_empty())
        .map(str::to_string)
}

async fn load_user(repo: &RepositoryState, user_id: i32) -> Result<Option<AuthUser>> {
    let Some(user) = repo.get_user(user_id).await? else {
        return Ok(None);
    };
    match user.role() {
        Some(role) => Ok(Some(AuthUser { id: user.id, role })),
        None => {
            tracing::warn!(user_id, role = %user.role, "user has an unrecognized role");
            Ok(None)
        }
    }
}

/// resolve_identity
///
/// Determines which user, if any, is attached to the request:
/// 1. An `AuthUser` already resolved by the auth middleware for this request.
/// 2. `Env::Local` with `dev_auth_bypass` on: the `x-user-id` header naming an existing user.
/// 3. A live session id from the cookie or bearer header.
///
/// Returns `Ok(None)` for anonymous requests. Errors are infrastructure failures only.
pub async fn resolve_identity(
    parts: &Parts,
    repo: &RepositoryState,
    sessions: &SessionState,
    config: &AppConfig,
) -> Result<Option<AuthUser>> {
    if let Some(user) = parts.extensions.get::<AuthUser>() {
        return Ok(Some(*user));
    }

    if config.env == Env::Local && config.dev_auth_bypass {
        let bypass_id = parts
            .headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i32>().ok());
        if let Some(user_id) = bypass_id {
            if let Some(user) = load_user(repo, user_id).await? {
                return Ok(Some(user));
            }
        }
    }

    let Some(sid) = session_id(&parts.headers) else {
        return Ok(None);
    };
    match sessions.resolve(&sid).await? {
        Some(user_id) => load_user(repo, user_id).await,
        None => Ok(None),
    }
}

/// Rejects anonymous requests with 401. Use `Option<AuthUser>` on endpoints whose
/// policy treats anonymous callers differently.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let repo = RepositoryState::from_ref(state);
        let sessions = SessionState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_identity(parts, &repo, &sessions, &config)
            .await?
            .ok_or(AppError::AuthenticationRequired)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Option<Self>> {
        let repo = RepositoryState::from_ref(state);
        let sessions = SessionState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_identity(parts, &repo, &sessions, &config).await
    }
}

// --- Credentials ---

/// Hashes a password with Argon2 and a fresh random salt (PHC string format).
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Checks `plain` against a stored PHC hash. A malformed stored hash never verifies.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is malformed: {}", e);
            false
        }
    }
}
