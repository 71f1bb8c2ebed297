use job_board::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    session::{PostgresSessionStore, SessionState},
    storage::{LocalDiskStorage, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are swept from the store.
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// main
///
/// Loads configuration, sets up logging, connects to Postgres (applying migrations),
/// wires the session store and resume storage into the shared state, then serves HTTP.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise crate debug with request-level tower_http logs.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "job_board=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.dev_auth_bypass {
        tracing::warn!("DEV_AUTH_BYPASS is on: x-user-id headers are trusted without a login");
    }

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .inspect_err(|e| tracing::error!("Failed to connect to Postgres: {}", e))?;

    let repository = PostgresRepository::new(pool.clone());
    repository.migrate().await?;
    let repo = Arc::new(repository) as RepositoryState;

    // 4. Sessions, plus a background sweep of expired ones.
    let sessions =
        Arc::new(PostgresSessionStore::new(pool, config.session_ttl()).await?) as SessionState;
    spawn_session_pruner(sessions.clone());

    // 5. Resume storage
    let storage = Arc::new(LocalDiskStorage::new(&config.upload_dir)) as StorageState;

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        sessions,
        storage,
        config,
    };

    // 6. Router and server
    let app = create_router(app_state);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_session_pruner(sessions: SessionState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            match sessions.prune_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "pruned expired sessions"),
                Err(e) => tracing::warn!("Session pruning failed: {}", e),
            }
        }
    });
}
