//! Raw captured rows and the direct-path error log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One source row of an ingested artifact.
///
/// `data` holds the parsed column map for well-formed rows; rows that could
/// not be aligned with the header keep their original text in `raw_content`
/// instead, so no input line is silently lost. Rows are created in bulk by
/// the raw ingestor and mutated only by the batch processor.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawRow {
    pub id: Uuid,
    pub artifact_id: Uuid,
    /// 1-based index of the row in the source file.
    pub row_index: i32,
    pub data: Option<serde_json::Value>,
    pub raw_content: Option<String>,
    pub status: RawRowStatus,
    pub error_message: Option<String>,
}

/// Raw row lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum RawRowStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSED")]
    Processed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl std::fmt::Display for RawRowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawRowStatus::Pending => write!(f, "PENDING"),
            RawRowStatus::Processed => write!(f, "PROCESSED"),
            RawRowStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl RawRow {
    /// Decode the stored column map, if this row parsed cleanly.
    pub fn columns(&self) -> Option<std::collections::HashMap<String, String>> {
        self.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Immutable audit record of a row-level failure in the direct (non-queue)
/// ingestion path. Write-only; never read by the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestionError {
    pub id: Uuid,
    pub raw_data: serde_json::Value,
    pub error_reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_row_status_display() {
        assert_eq!(RawRowStatus::Pending.to_string(), "PENDING");
        assert_eq!(RawRowStatus::Processed.to_string(), "PROCESSED");
        assert_eq!(RawRowStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_columns_roundtrip() {
        let row = RawRow {
            id: Uuid::new_v4(),
            artifact_id: Uuid::new_v4(),
            row_index: 1,
            data: Some(json!({"provider_npi": "1234567890", "status": "submitted"})),
            raw_content: None,
            status: RawRowStatus::Pending,
            error_message: None,
        };

        let columns = row.columns().unwrap();
        assert_eq!(columns.get("provider_npi").map(String::as_str), Some("1234567890"));
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn test_columns_absent_for_fallback_rows() {
        let row = RawRow {
            id: Uuid::new_v4(),
            artifact_id: Uuid::new_v4(),
            row_index: 3,
            data: None,
            raw_content: Some("mangled,line".to_string()),
            status: RawRowStatus::Pending,
            error_message: None,
        };

        assert!(row.columns().is_none());
    }
}
