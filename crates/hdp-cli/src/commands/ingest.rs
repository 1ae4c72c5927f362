//! Direct file ingestion command
//!
//! Runs both pipeline phases synchronously: raw capture of the local file,
//! then batch processing under the named dataset's strategy. Failed rows are
//! copied into the ingestion error log before the command reports counts.

use std::path::Path;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use hdp_server::pipeline::{BatchProcessor, RawIngestor};
use hdp_server::strategies::StrategyRegistry;

use crate::error::{CliError, Result};

pub async fn run(pool: PgPool, file: &Path, dataset: &str) -> Result<()> {
    let registry = Arc::new(StrategyRegistry::with_defaults());

    if registry.get(dataset).is_none() {
        return Err(CliError::UnknownDataset {
            name: dataset.to_string(),
            known: registry.datasets().join(", "),
        });
    }

    if !file.is_file() {
        return Err(CliError::FileNotFound(file.display().to_string()));
    }

    let bytes = std::fs::read(file)?;
    let storage_key = file.display().to_string();

    info!(file = %storage_key, dataset, "Starting direct ingestion");

    let ingestor = RawIngestor::new(pool.clone());
    let artifact = ingestor.ingest(&bytes, &storage_key, dataset).await?;

    if artifact.is_failed() {
        return Err(CliError::IngestFailed(storage_key));
    }

    let processor = BatchProcessor::new(pool, registry);
    let outcome = processor.process(artifact.id).await?;
    let recorded = processor.record_ingestion_errors(artifact.id).await?;

    println!("Ingested '{}' into dataset '{}'", storage_key, dataset);
    println!("  processed: {}", outcome.processed);
    println!("  failed:    {}", outcome.failed);
    if recorded > 0 {
        println!("  {} row failure(s) recorded in the ingestion error log", recorded);
    }

    Ok(())
}
