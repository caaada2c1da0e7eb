use std::sync::Arc;
use std::time::Duration;

use mockup_gemini::api::GeminiApi;
use mockup_pipeline::adapter::{GeminiImageProvider, GenerationAdapter};
use mockup_pipeline::config::WorkerConfig;
use mockup_pipeline::storage::LocalFileStorage;
use mockup_pipeline::store::{PgGenerationStore, PgJobQueue};
use mockup_pipeline::worker::{GenerationWorker, WorkerPool};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mockup_worker=debug,mockup_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        concurrency = config.concurrency,
        model = %config.gemini_model,
        storage_root = %config.storage_root.display(),
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = mockup_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    mockup_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let api = GeminiApi::new(
        &config.gemini_api_base,
        &config.gemini_api_key,
        &config.gemini_model,
        config.provider_timeout,
    )
    .expect("Failed to build provider HTTP client");
    let adapter = GenerationAdapter::new(Arc::new(GeminiImageProvider::new(api)));

    let store = Arc::new(PgGenerationStore::new(pool.clone()));
    let queue = Arc::new(PgJobQueue::new(pool, config.retry));
    let files = Arc::new(LocalFileStorage::new(config.storage_root.clone()));

    let worker = Arc::new(GenerationWorker::new(store, files, adapter));
    let worker_pool = Arc::new(
        WorkerPool::new(
            worker,
            queue,
            config.retry,
            config.concurrency,
            config.job_timeout,
        )
        .with_poll_interval(config.poll_interval),
    );

    // --- Run until signalled ---
    let cancel = CancellationToken::new();
    let pool_handle = tokio::spawn(worker_pool.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();

    // In-flight jobs finish first; a stuck provider call is bounded by the job timeout.
    let grace = config.job_timeout + Duration::from_secs(5);
    if tokio::time::timeout(grace, pool_handle).await.is_err() {
        tracing::warn!("Worker pool did not stop within the grace period");
    }

    tracing::info!("Graceful shutdown complete");
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
