//! Job definitions for the ingestion pipeline
//!
//! Two chained job types back the asynchronous path: an ingest job per
//! notified file, and a process job dispatched once raw capture completes.
//! Payloads are serialized into the apalis Postgres queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File ingestion job payload
///
/// Dispatched by the queue consumer for each storage-change notification;
/// runs the raw ingestor against the named object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFileJob {
    /// Bucket the notification came from.
    pub bucket_name: String,
    /// Decoded object key; doubles as the routing key for dataset dispatch.
    pub object_key: String,
    /// Timestamp when the job was created.
    pub created_at: DateTime<Utc>,
}

impl IngestFileJob {
    pub fn new(bucket_name: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_key: object_key.into(),
            created_at: Utc::now(),
        }
    }
}

/// Artifact processing job payload
///
/// Dispatched by the ingest handler after raw capture completes; runs the
/// batch processor for one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessArtifactJob {
    /// Artifact whose pending rows should be processed.
    pub artifact_id: Uuid,
    /// Timestamp when the job was created.
    pub created_at: DateTime<Utc>,
}

impl ProcessArtifactJob {
    pub fn new(artifact_id: Uuid) -> Self {
        Self {
            artifact_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_job_roundtrip() {
        let job = IngestFileJob::new("hdp-dropbox", "audit/2023.csv");
        let json = serde_json::to_string(&job).unwrap();
        let decoded: IngestFileJob = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.bucket_name, "hdp-dropbox");
        assert_eq!(decoded.object_key, "audit/2023.csv");
    }

    #[test]
    fn test_process_job_roundtrip() {
        let job = ProcessArtifactJob::new(Uuid::new_v4());
        let json = serde_json::to_string(&job).unwrap();
        let decoded: ProcessArtifactJob = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.artifact_id, job.artifact_id);
    }
}
