//! Ingested file artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ingested file and its lifecycle status.
///
/// Created by the raw ingestor before parsing begins, so a crash mid-parse
/// leaves a durable, inspectable record. Success/failure row counts are
/// derived from `raw_rows` on demand and never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artifact {
    pub id: Uuid,
    /// Object storage key or local path the file was read from.
    pub storage_key: String,
    /// Dataset name the file was routed to (e.g. "audit", "pharmacy").
    pub dataset: String,
    pub status: ArtifactStatus,
    pub created_at: DateTime<Utc>,
}

/// Artifact lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum ArtifactStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactStatus::Pending => write!(f, "PENDING"),
            ArtifactStatus::Processing => write!(f, "PROCESSING"),
            ArtifactStatus::Completed => write!(f, "COMPLETED"),
            ArtifactStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for ArtifactStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ArtifactStatus::Pending),
            "PROCESSING" => Ok(ArtifactStatus::Processing),
            "COMPLETED" => Ok(ArtifactStatus::Completed),
            "FAILED" => Ok(ArtifactStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid artifact status: {}", s)),
        }
    }
}

impl Artifact {
    /// Whether raw capture finished and the artifact is ready to process.
    pub fn is_completed(&self) -> bool {
        self.status == ArtifactStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ArtifactStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_status_display() {
        assert_eq!(ArtifactStatus::Pending.to_string(), "PENDING");
        assert_eq!(ArtifactStatus::Processing.to_string(), "PROCESSING");
        assert_eq!(ArtifactStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(ArtifactStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_artifact_status_from_str() {
        assert_eq!("PENDING".parse::<ArtifactStatus>().unwrap(), ArtifactStatus::Pending);
        assert_eq!("completed".parse::<ArtifactStatus>().unwrap(), ArtifactStatus::Completed);
        assert!("DONE".parse::<ArtifactStatus>().is_err());
    }

    #[test]
    fn test_artifact_predicates() {
        let artifact = Artifact {
            id: Uuid::new_v4(),
            storage_key: "audit/2023.csv".to_string(),
            dataset: "audit".to_string(),
            status: ArtifactStatus::Completed,
            created_at: Utc::now(),
        };

        assert!(artifact.is_completed());
        assert!(!artifact.is_failed());
    }
}
