use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Result alias used by handlers, repositories and the session store.
pub type Result<T> = std::result::Result<T, AppError>;

/// AppError
///
/// The single error taxonomy of the service. Every failure terminates the request;
/// nothing here is retried. The `IntoResponse` impl is the only place that decides
/// which HTTP status a failure maps to.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No session (or bypass header) resolved to a user.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Wrong username or password on login.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Authenticated with the wrong role, or unauthenticated on a role-gated endpoint.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Schema mismatch; rendered with per-field details.
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Missing resume, missing status, malformed body, duplicate username.
    #[error("{0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // 413 when the body limit cut the stream, 400 for malformed parts.
            AppError::Multipart(e) => e.status(),
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = match self {
            AppError::Validation(errors) => json!({
                "error": "Validation failed",
                "fields": errors,
            }),
            // Infrastructure details stay in the logs.
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Io(_)
            | AppError::Internal(_) => json!({ "error": "An unexpected error occurred" }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
