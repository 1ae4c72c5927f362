//! HDP Server - Main entry point

use anyhow::Result;
use apalis_postgres::PostgresStorage;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use hdp_common::logging::{init_logging, LogConfig};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::{net::SocketAddr, time::Duration};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use hdp_server::{
    config::Config,
    jobs::{IngestFileJob, ProcessArtifactJob},
    queue::QueueConsumer,
    storage::{config::StorageConfig, Storage},
    strategies::StrategyRegistry,
    worker::{self, JobContext},
};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    db: sqlx::PgPool,
    /// SQS client and queue URL, present when the consumer is enabled.
    queue: Option<(aws_sdk_sqs::Client, String)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("hdp-server".to_string())
        .filter_directives("hdp_server=debug,axum=info,sqlx=info".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting HDP Server");

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    // Run migrations
    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    // Initialize S3 storage
    let storage_config = StorageConfig::from_env()?;
    let object_store = Storage::new(storage_config).await?;
    info!("Object storage client initialized");

    // Strategy registry: one explicit list, fixed at startup
    let registry = Arc::new(StrategyRegistry::with_defaults());
    info!("Registered datasets: {:?}", registry.datasets());

    // Set up the apalis job queue backed by Postgres
    PostgresStorage::setup(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to set up job storage: {}", e))?;
    let ingest_jobs: PostgresStorage<IngestFileJob> = PostgresStorage::new(&db_pool);
    let process_jobs: PostgresStorage<ProcessArtifactJob> = PostgresStorage::new(&db_pool);

    let job_ctx = JobContext {
        pool: db_pool.clone(),
        registry,
        object_store,
        process_jobs: process_jobs.clone(),
    };

    let _worker_handle = worker::start_workers(job_ctx, ingest_jobs.clone(), process_jobs);
    info!("Job workers started");

    // Start the SQS notification consumer if enabled
    let (consumer, health_queue) = if config.queue.enabled {
        let client = sqs_client().await;
        let consumer = QueueConsumer::new(client.clone(), config.queue.clone(), ingest_jobs);
        let _consumer_handle = consumer.start();
        info!("Queue consumer started");
        (Some(consumer), Some((client, config.queue.queue_url.clone())))
    } else {
        info!("Queue consumer is disabled (QUEUE_ENABLED=false)");
        (None, None)
    };

    // Create application state
    let state = AppState {
        db: db_pool,
        queue: health_queue,
    };

    // Build the application router
    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    // The consumer exits after its current poll cycle
    if let Some(consumer) = consumer {
        consumer.stop();
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Build an SQS client from the ambient AWS configuration.
///
/// `SQS_ENDPOINT` overrides the endpoint for local stacks.
async fn sqs_client() -> aws_sdk_sqs::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Ok(endpoint) = std::env::var("SQS_ENDPOINT") {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;
    aws_sdk_sqs::Client::new(&aws_config)
}

/// Health check handler
///
/// Reports two independent connectivity checks and an overall status; a
/// failing check degrades the response to 503 without stopping the process.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            false
        },
    };

    let queue_ok = match &state.queue {
        Some((client, queue_url)) => {
            match client
                .get_queue_attributes()
                .queue_url(queue_url)
                .send()
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    tracing::error!("Queue health check failed: {:?}", e);
                    false
                },
            }
        },
        // Consumer disabled: nothing to check
        None => true,
    };

    let healthy = database_ok && queue_ok;
    let (status, overall) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": overall,
            "database": database_ok,
            "queue": queue_ok,
        })),
    )
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give in-flight requests time to complete
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
