//! HDP Server Library
//!
//! Two-phase ingestion pipeline for healthcare transaction files:
//!
//! 1. **Raw capture** ([`pipeline::RawIngestor`]) parses a CSV file into
//!    row-level JSON documents stored under a new [`models::Artifact`].
//! 2. **Processing** ([`pipeline::BatchProcessor`]) validates, transforms,
//!    and bulk-upserts those rows into domain tables through a per-dataset
//!    [`strategies::DatasetStrategy`].
//!
//! The asynchronous trigger path is an SQS [`queue::QueueConsumer`] that
//! turns object-storage notifications into [`jobs::IngestFileJob`]s executed
//! by an apalis worker pool ([`worker`]).

pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod strategies;
pub mod worker;

pub use error::{AppError, AppResult};
