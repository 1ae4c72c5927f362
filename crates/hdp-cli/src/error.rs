//! Error types for the HDP CLI
//!
//! All errors are user-facing: one clear line per failure class, printed to
//! the terminal rather than surfaced as a crash.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// User-facing error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file is missing or unreadable
    #[error("File not found: '{0}'. Verify the file path exists and you have read permissions.")]
    FileNotFound(String),

    /// Dataset name has no registered strategy
    #[error("Unknown dataset: '{name}'. Known datasets: {known}.")]
    UnknownDataset { name: String, known: String },

    /// Raw capture marked the artifact FAILED
    #[error("Ingestion failed for '{0}': the file is empty, has no header, or could not be parsed.")]
    IngestFailed(String),

    /// Database operation failed
    #[error("Database error: {0}. Check your database connection settings.")]
    Database(#[from] sqlx::Error),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Pipeline operation failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] hdp_server::AppError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_dataset_lists_alternatives() {
        let err = CliError::UnknownDataset {
            name: "dental".to_string(),
            known: "audit, pharmacy, labs".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("dental"));
        assert!(message.contains("audit, pharmacy, labs"));
    }
}
