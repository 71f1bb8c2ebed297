use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{patch, post},
};

/// Role-Gated Router Module
///
/// Write endpoints limited to one role. Anonymous callers are answered with 403,
/// the same as callers with the wrong role, so these routes are deliberately NOT
/// behind the authentication middleware (which would answer 401).
pub fn restricted_routes() -> Router<AppState> {
    Router::new()
        // POST /api/jobs
        // EMPLOYER only. Ownership is bound to the caller.
        .route("/api/jobs", post(handlers::create_job))
        // POST /api/jobs/{id}/apply
        // JOB_SEEKER only. Multipart: `resume` file (required), `coverLetter` text.
        .route("/api/jobs/{id}/apply", post(handlers::apply_to_job))
        // PATCH /api/applications/{id}/status
        // EMPLOYER only. Free-form status overwrite.
        .route(
            "/api/applications/{id}/status",
            patch(handlers::update_application_status),
        )
}
