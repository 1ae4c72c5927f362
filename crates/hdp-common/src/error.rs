//! Error types for HDP

use thiserror::Error;

/// Result type alias for HDP operations
pub type Result<T> = std::result::Result<T, HdpError>;

/// Main error type for HDP
#[derive(Error, Debug)]
pub enum HdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
