use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no identity. Job data is public; account endpoints are how an
/// identity gets attached to a session in the first place.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /api/jobs
        // Every posting, no pagination.
        .route("/api/jobs", get(handlers::list_jobs))
        // GET /api/jobs/{id}
        .route("/api/jobs/{id}", get(handlers::get_job))
        // POST /api/register
        // Creates an account and opens a session for it.
        .route("/api/register", post(handlers::register_user))
        // POST /api/login
        .route("/api/login", post(handlers::login))
        // POST /api/logout
        // Safe to call without a session.
        .route("/api/logout", post(handlers::logout))
}
