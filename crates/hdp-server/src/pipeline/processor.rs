//! Batch processing of pending raw rows into domain records
//!
//! Drains an artifact's `PENDING` rows in fixed-size batches through the
//! dataset's strategy. Row statuses are only persisted after the batch's
//! bulk upsert commits, so a crash at any point leaves rows `PENDING` and
//! safe to reprocess.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::RawRow;
use crate::strategies::{RowMap, RowOutcome, StrategyRegistry};

/// Rows validated and upserted per batch.
const PROCESS_BATCH_SIZE: usize = 1000;

/// Success/failure row counts for one processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub processed: u64,
    pub failed: u64,
}

/// Runs phase two of the pipeline for one artifact at a time.
#[derive(Clone)]
pub struct BatchProcessor {
    pool: PgPool,
    registry: Arc<StrategyRegistry>,
}

impl BatchProcessor {
    pub fn new(pool: PgPool, registry: Arc<StrategyRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Validate, transform, and upsert all pending rows of an artifact.
    ///
    /// Fails fast with a terminal error if the artifact does not exist or
    /// its dataset has no registered strategy. A failed bulk write aborts
    /// the run with row statuses untouched; row-level validation failures
    /// are recorded per row and never abort a batch.
    pub async fn process(&self, artifact_id: Uuid) -> AppResult<ProcessOutcome> {
        let dataset: String =
            sqlx::query_scalar("SELECT dataset FROM artifacts WHERE id = $1")
                .bind(artifact_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("artifact {}", artifact_id)))?;

        let strategy = self
            .registry
            .get(&dataset)
            .ok_or_else(|| AppError::UnknownDataset(dataset.clone()))?;

        let pending = sqlx::query_as::<_, RawRow>(
            "SELECT id, artifact_id, row_index, data, raw_content, status, error_message \
             FROM raw_rows \
             WHERE artifact_id = $1 AND status = 'PENDING' \
             ORDER BY row_index",
        )
        .bind(artifact_id)
        .fetch_all(&self.pool)
        .await?;

        info!(
            %artifact_id,
            dataset,
            pending = pending.len(),
            "Processing artifact"
        );

        let mut outcome = ProcessOutcome::default();

        for chunk in pending.chunks(PROCESS_BATCH_SIZE) {
            let (parseable, mut failures) = partition_rows(chunk);

            let row_maps: Vec<RowMap> = parseable.iter().map(|(_, map)| map.clone()).collect();
            let outcomes = strategy.load_batch(&self.pool, &row_maps).await?;

            let mut processed_ids = Vec::new();
            for ((row_id, _), row_outcome) in parseable.iter().zip(outcomes) {
                match row_outcome {
                    RowOutcome::Loaded => processed_ids.push(*row_id),
                    RowOutcome::Failed(message) => failures.push((*row_id, message)),
                }
            }

            // The upsert committed; only now advance row statuses.
            self.mark_processed(&processed_ids).await?;
            self.mark_failed(&failures).await?;

            outcome.processed += processed_ids.len() as u64;
            outcome.failed += failures.len() as u64;
        }

        if outcome.failed > 0 {
            warn!(
                %artifact_id,
                processed = outcome.processed,
                failed = outcome.failed,
                "Artifact processed with row failures"
            );
        } else {
            info!(%artifact_id, processed = outcome.processed, "Artifact processed");
        }

        Ok(outcome)
    }

    async fn mark_processed(&self, row_ids: &[Uuid]) -> AppResult<()> {
        if row_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "UPDATE raw_rows SET status = 'PROCESSED', error_message = NULL \
             WHERE id = ANY($1)",
        )
        .bind(row_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, failures: &[(Uuid, String)]) -> AppResult<()> {
        for (row_id, message) in failures {
            sqlx::query("UPDATE raw_rows SET status = 'FAILED', error_message = $2 WHERE id = $1")
                .bind(row_id)
                .bind(message)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Copy this artifact's failed rows into the immutable error log.
    ///
    /// Used by the direct (non-queue) path after processing; returns the
    /// number of errors recorded.
    pub async fn record_ingestion_errors(&self, artifact_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "INSERT INTO ingestion_errors (raw_data, error_reason) \
             SELECT COALESCE(data, jsonb_build_object('raw_content', raw_content)), \
                    COALESCE(error_message, 'unknown error') \
             FROM raw_rows \
             WHERE artifact_id = $1 AND status = 'FAILED'",
        )
        .bind(artifact_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Split a batch into rows with a decodable column map and rows that failed
/// before validation could even run (fallback raw-text rows).
fn partition_rows(rows: &[RawRow]) -> (Vec<(Uuid, RowMap)>, Vec<(Uuid, String)>) {
    let mut parseable = Vec::with_capacity(rows.len());
    let mut failures = Vec::new();

    for row in rows {
        match row.columns() {
            Some(map) => parseable.push((row.id, map)),
            None => failures.push((
                row.id,
                "Row could not be aligned with the file header".to_string(),
            )),
        }
    }

    (parseable, failures)
}
