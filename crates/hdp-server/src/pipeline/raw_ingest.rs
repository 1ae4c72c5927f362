//! Raw capture of source files into artifacts and raw rows
//!
//! The ingestor never performs business validation; its one job is to get
//! every input line into the database with 1:1 column fidelity. The artifact
//! status is the error signal: any parse or write failure marks the artifact
//! `FAILED` and returns normally, so callers inspect the returned artifact
//! rather than catching errors.

use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Artifact, ArtifactStatus};

/// Rows written per INSERT, bounding memory and statement size.
const ROW_BATCH_SIZE: usize = 1000;

/// One captured source row, before persistence.
///
/// Well-formed rows carry the parsed column map in `data`; rows that do not
/// align with the header keep their original text in `raw_content` so no
/// input line is silently lost.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRow {
    pub data: Option<serde_json::Value>,
    pub raw_content: Option<String>,
}

/// Parses delimited files and persists their rows under a new artifact.
#[derive(Clone)]
pub struct RawIngestor {
    pool: PgPool,
}

impl RawIngestor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Capture a file's rows under a newly created artifact.
    ///
    /// The artifact is created `PROCESSING` before parsing begins, so a
    /// crash mid-parse leaves a durable record. Returns the artifact with
    /// its final status; parse and write failures surface as
    /// [`ArtifactStatus::Failed`], not as an `Err`. Only failures to touch
    /// the artifact record itself propagate.
    pub async fn ingest(
        &self,
        file_bytes: &[u8],
        storage_key: &str,
        dataset: &str,
    ) -> AppResult<Artifact> {
        let artifact = self.create_artifact(storage_key, dataset).await?;
        info!(
            artifact_id = %artifact.id,
            storage_key,
            dataset,
            "Starting raw capture"
        );

        let captured = match parse_csv(file_bytes) {
            Ok(rows) => rows,
            Err(reason) => {
                error!(artifact_id = %artifact.id, %reason, "Raw capture failed during parse");
                return self.finish(artifact.id, ArtifactStatus::Failed).await;
            },
        };

        if captured.is_empty() {
            // Empty or header-only file: a structural failure, not an error.
            warn!(artifact_id = %artifact.id, storage_key, "File has no data rows");
            return self.finish(artifact.id, ArtifactStatus::Failed).await;
        }

        if let Err(e) = self.write_rows(artifact.id, &captured).await {
            error!(artifact_id = %artifact.id, error = %e, "Raw capture failed during write");
            return self.finish(artifact.id, ArtifactStatus::Failed).await;
        }

        info!(
            artifact_id = %artifact.id,
            rows = captured.len(),
            "Raw capture complete"
        );
        self.finish(artifact.id, ArtifactStatus::Completed).await
    }

    async fn create_artifact(&self, storage_key: &str, dataset: &str) -> AppResult<Artifact> {
        let artifact = sqlx::query_as::<_, Artifact>(
            "INSERT INTO artifacts (storage_key, dataset, status) \
             VALUES ($1, $2, 'PROCESSING') \
             RETURNING id, storage_key, dataset, status, created_at",
        )
        .bind(storage_key)
        .bind(dataset)
        .fetch_one(&self.pool)
        .await?;

        Ok(artifact)
    }

    async fn finish(&self, artifact_id: Uuid, status: ArtifactStatus) -> AppResult<Artifact> {
        let artifact = sqlx::query_as::<_, Artifact>(
            "UPDATE artifacts SET status = $2 WHERE id = $1 \
             RETURNING id, storage_key, dataset, status, created_at",
        )
        .bind(artifact_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(artifact)
    }

    /// Bulk-insert captured rows, 1-based row index, fixed-size batches.
    ///
    /// Batch boundaries carry no meaning; ordering is preserved by the
    /// stored row index alone.
    async fn write_rows(&self, artifact_id: Uuid, rows: &[CapturedRow]) -> sqlx::Result<()> {
        let indexed: Vec<(i32, &CapturedRow)> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i as i32 + 1, row))
            .collect();

        for chunk in indexed.chunks(ROW_BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO raw_rows (artifact_id, row_index, data, raw_content) ");

            builder.push_values(chunk, |mut b, (row_index, row)| {
                b.push_bind(artifact_id)
                    .push_bind(*row_index)
                    .push_bind(&row.data)
                    .push_bind(&row.raw_content);
            });

            builder.build().execute(&self.pool).await?;
        }

        Ok(())
    }
}

/// Parse CSV bytes into captured rows.
///
/// Strips a UTF-8 byte-order mark, trims whitespace from header keys and
/// cell values, and drops columns with empty header keys. A record whose
/// field count differs from the header's becomes a raw-text fallback row.
/// Returns an empty vector for empty or header-only input.
fn parse_csv(file_bytes: &[u8]) -> Result<Vec<CapturedRow>, String> {
    let text = std::str::from_utf8(file_bytes).map_err(|e| format!("file is not UTF-8: {}", e))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("failed to read header: {}", e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("failed to read record: {}", e))?;

        if record.len() == headers.len() {
            let map: serde_json::Map<String, serde_json::Value> = headers
                .iter()
                .zip(record.iter())
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.clone(), serde_json::Value::from(value.trim())))
                .collect();

            rows.push(CapturedRow {
                data: Some(serde_json::Value::Object(map)),
                raw_content: None,
            });
        } else {
            rows.push(CapturedRow {
                data: None,
                raw_content: Some(record.iter().collect::<Vec<_>>().join(",")),
            });
        }
    }

    Ok(rows)
}
