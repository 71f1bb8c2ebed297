use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;
pub mod session;
pub mod storage;

// Routing split by how much identity a route needs (Public, Authenticated, Restricted).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public, restricted};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use session::{InMemorySessionStore, PostgresSessionStore, SessionState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// OpenAPI document for every `#[utoipa::path]` handler and the request/response
/// schemas. Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_jobs, handlers::create_job, handlers::get_job,
        handlers::apply_to_job, handlers::list_applications,
        handlers::update_application_status, handlers::register_user,
        handlers::login, handlers::logout, handlers::current_user
    ),
    components(
        schemas(
            models::Job, models::CreateJobRequest, models::Application,
            models::UpdateStatusRequest, models::ApplyForm, models::User,
            models::RegisterUserRequest, models::LoginRequest, models::Role,
            models::ApplicationStatus,
        )
    ),
    tags(
        (name = "job-board", description = "Job Board API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single container of shared services, cloned into every request. Each field is
/// an `Arc` (or cheap to clone), so cloning the state never copies data.
#[derive(Clone)]
pub struct AppState {
    /// Jobs, applications and users.
    pub repo: RepositoryState,
    /// Login sessions keyed by the `sid` cookie.
    pub sessions: SessionState,
    /// Where resume uploads are written.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. Extracting `AuthUser` either resolves the session
/// (or the local `x-user-id` bypass) or rejects the request with 401 before the
/// handler runs. The resolved user is stored in the request extensions so the
/// handler's own `AuthUser` extraction does not hit the session store again.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles every route, the scoped auth middleware, the body limit and the
/// observability layers, then binds the shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Shares `/api/jobs` with the public GET; only the methods differ.
        .merge(restricted::restricted_routes())
        .layer(body_limit)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id, so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
