//! HDP CLI Library
//!
//! Direct ingestion path for local files: runs the same two-phase pipeline
//! as the server's job workers, synchronously and against a local path
//! instead of an object-store notification. Row failures are additionally
//! copied into the ingestion error log so the run leaves an audit trail.

pub mod commands;
pub mod error;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HDP - Healthcare Data Pipeline
#[derive(Parser, Debug)]
#[command(name = "hdp")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgresql://localhost/hdp",
        global = true
    )]
    pub database_url: String,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a local CSV file into a dataset
    Ingest {
        /// Path to the CSV file
        file: PathBuf,

        /// Dataset to ingest into
        #[arg(short, long, default_value = "audit")]
        dataset: String,
    },
}
