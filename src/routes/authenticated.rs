use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes that require a logged-in user of any role. The router in `lib.rs` wraps
/// this module in the authentication middleware, so handlers here always receive a
/// resolved `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/user
        // The current session's user.
        .route("/api/user", get(handlers::current_user))
        // GET /api/applications
        // Job seekers see their own applications, employers those to their jobs.
        // Other roles are refused by the policy inside the handler.
        .route("/api/applications", get(handlers::list_applications))
}
