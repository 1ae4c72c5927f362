//! Data models for the ingestion pipeline
//!
//! Lifecycle models only; the domain record types live next to their
//! strategies in [`crate::strategies`].

mod artifact;
mod raw_row;

pub use artifact::{Artifact, ArtifactStatus};
pub use raw_row::{IngestionError, RawRow, RawRowStatus};
