use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mockup_api::auth::jwt::TokenVerifier;
use mockup_api::config::ServerConfig;
use mockup_api::router::build_app_router;
use mockup_api::state::AppState;
use mockup_pipeline::config::env_parse;
use mockup_pipeline::dispatcher::JobDispatcher;
use mockup_pipeline::queue::RetryPolicy;
use mockup_pipeline::store::{PgGenerationStore, PgJobQueue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mockup_api=debug,mockup_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        cors_origins = config.cors_origins.len(),
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = mockup_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    mockup_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    mockup_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Dispatcher ---
    // Enqueued entries carry the attempt budget the worker will honour.
    let defaults = RetryPolicy::default();
    let policy = RetryPolicy {
        max_attempts: env_parse("QUEUE_MAX_ATTEMPTS", defaults.max_attempts),
        ..defaults
    };
    let dispatcher = JobDispatcher::new(
        Arc::new(PgGenerationStore::new(pool.clone())),
        Arc::new(PgJobQueue::new(pool.clone(), policy)),
    );

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        tokens: Arc::new(TokenVerifier::new(&config.jwt)),
        pool: Some(pool),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    // In-flight requests get `SHUTDOWN_TIMEOUT_SECS` to finish.
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(drain, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Graceful shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "Server task panicked"),
        Err(_) => tracing::warn!(drain_secs = drain.as_secs(), "Shutdown drain timed out"),
    }
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
