//! apalis worker pool for pipeline jobs
//!
//! Runs the two pipeline stages as chained jobs: the ingest handler captures
//! the notified file and, on success, dispatches a process job for the new
//! artifact. Transient failures are retried in-process with a fixed delay;
//! terminal failures (missing artifact, no routing mapping) are logged and
//! never re-run, since retrying cannot fix them.

use std::future::Future;
use std::sync::Arc;

use apalis::prelude::*;
use apalis_postgres::PostgresStorage;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::jobs::{IngestFileJob, ProcessArtifactJob};
use crate::pipeline::{BatchProcessor, RawIngestor};
use crate::storage::Storage as ObjectStore;
use crate::strategies::StrategyRegistry;

/// Maximum attempts per job before giving up.
const MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(60);

/// Shared dependencies injected into every job handler.
#[derive(Clone)]
pub struct JobContext {
    pub pool: PgPool,
    pub registry: Arc<StrategyRegistry>,
    pub object_store: ObjectStore,
    pub process_jobs: PostgresStorage<ProcessArtifactJob>,
}

/// Spawn the worker pool for both job types.
pub fn start_workers(
    ctx: JobContext,
    ingest_jobs: PostgresStorage<IngestFileJob>,
    process_jobs: PostgresStorage<ProcessArtifactJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Job workers started");

        let ingest_ctx = ctx.clone();
        let process_ctx = ctx;

        if let Err(e) = Monitor::new()
            .register(move |_index| {
                WorkerBuilder::new("hdp-ingest-worker")
                    .data(ingest_ctx.clone())
                    .backend(ingest_jobs.clone())
                    .build(handle_ingest_file)
            })
            .register(move |_index| {
                WorkerBuilder::new("hdp-process-worker")
                    .data(process_ctx.clone())
                    .backend(process_jobs.clone())
                    .build(handle_process_artifact)
            })
            .run()
            .await
        {
            error!("Job worker error: {:?}", e);
        }

        info!("Job workers stopped");
    })
}

/// Ingest job handler: download, raw-capture, chain the process job.
pub async fn handle_ingest_file(job: IngestFileJob, ctx: Data<JobContext>) -> Result<(), Error> {
    let ctx = &*ctx;
    run_with_retry("ingest_file", || ingest_file(&job, ctx))
        .await
        .map_err(into_job_error)
}

/// Process job handler: drain pending rows for one artifact.
pub async fn handle_process_artifact(
    job: ProcessArtifactJob,
    ctx: Data<JobContext>,
) -> Result<(), Error> {
    let ctx = &*ctx;
    run_with_retry("process_artifact", || process_artifact(&job, ctx))
        .await
        .map_err(into_job_error)
}

async fn ingest_file(job: &IngestFileJob, ctx: &JobContext) -> AppResult<()> {
    info!(
        bucket = %job.bucket_name,
        key = %job.object_key,
        "Processing ingest job"
    );

    // Routing is resolved before the download so an unmapped key fails
    // terminally without touching storage.
    let strategy = ctx.registry.resolve_routing_key(&job.object_key)?;

    let bytes = ctx
        .object_store
        .download(&job.bucket_name, &job.object_key)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let ingestor = RawIngestor::new(ctx.pool.clone());
    let artifact = ingestor
        .ingest(&bytes, &job.object_key, strategy.dataset())
        .await?;

    if artifact.is_completed() {
        let mut process_jobs = ctx.process_jobs.clone();
        process_jobs
            .push(ProcessArtifactJob::new(artifact.id))
            .await
            .map_err(|e| AppError::Queue(format!("failed to dispatch process job: {}", e)))?;
        info!(artifact_id = %artifact.id, "Raw capture complete, process job dispatched");
    } else {
        warn!(
            artifact_id = %artifact.id,
            status = %artifact.status,
            "Raw capture did not complete, processing not dispatched"
        );
    }

    Ok(())
}

async fn process_artifact(job: &ProcessArtifactJob, ctx: &JobContext) -> AppResult<()> {
    info!(artifact_id = %job.artifact_id, "Processing artifact job");

    let processor = BatchProcessor::new(ctx.pool.clone(), ctx.registry.clone());
    let outcome = processor.process(job.artifact_id).await?;

    info!(
        artifact_id = %job.artifact_id,
        processed = outcome.processed,
        failed = outcome.failed,
        "Artifact job complete"
    );

    Ok(())
}

/// Run a job body with bounded fixed-delay retry.
///
/// Terminal errors are logged and swallowed so the queue never re-runs
/// them; transient errors are retried up to [`MAX_ATTEMPTS`] and then
/// surfaced to the job backend as a failure.
async fn run_with_retry<F, Fut>(label: &str, mut op: F) -> AppResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_terminal() => {
                error!(job = label, error = %e, "Terminal failure, not retrying");
                return Ok(());
            },
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!(
                    job = label,
                    attempt,
                    max_attempts = MAX_ATTEMPTS,
                    error = %e,
                    "Job attempt failed, retrying after delay"
                );
                sleep(RETRY_DELAY).await;
                attempt += 1;
            },
            Err(e) => {
                error!(
                    job = label,
                    attempts = MAX_ATTEMPTS,
                    error = %e,
                    "Retry budget exhausted"
                );
                return Err(e);
            },
        }
    }
}

fn into_job_error(e: AppError) -> Error {
    Error::Failed(Arc::new(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_stops_on_first_success() {
        let attempts = AtomicU32::new(0);
        let result = run_with_retry("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let attempts = AtomicU32::new(0);
        let result = run_with_retry("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::NoStrategy("unknown/x.csv".to_string())) }
        })
        .await;

        // Terminal failures are logged and swallowed
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_exhausts_retry_budget() {
        let attempts = AtomicU32::new(0);
        let result = run_with_retry("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Storage("connection reset".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_recovers_mid_retry() {
        let attempts = AtomicU32::new(0);
        let result = run_with_retry("test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(AppError::Storage("timeout".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
