//! Two-phase ingestion pipeline
//!
//! Phase one ([`RawIngestor`]) captures every line of a source file as raw
//! rows under a new artifact, without any business validation. Phase two
//! ([`BatchProcessor`]) drains the artifact's pending rows through the
//! resolved dataset strategy and bulk-upserts the domain records. The phases
//! are independently idempotent, so either can be re-run after a crash.

pub mod processor;
pub mod raw_ingest;

pub use processor::{BatchProcessor, ProcessOutcome};
pub use raw_ingest::RawIngestor;
