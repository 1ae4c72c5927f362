//! HDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the HDP workspace members.
//!
//! # Overview
//!
//! - **Error Handling**: the [`HdpError`] enum and [`Result`] alias shared
//!   by the workspace binaries.
//! - **Logging**: centralized tracing setup via [`logging::LogConfig`] and
//!   [`logging::init_logging`].
//!
//! # Example
//!
//! ```no_run
//! use hdp_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> hdp_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{HdpError, Result};
