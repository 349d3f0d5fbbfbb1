//! Domain types for the speechbank pipeline.
//!
//! This module contains the core data structures:
//! - Records: units of text tracked by the work store
//! - Metadata: sidecar written next to each synthesized sample

pub mod metadata;
pub mod record;

// Re-export commonly used types
pub use metadata::{Provenance, SampleMetadata};
pub use record::{NewRecord, StoreStats, WorkRecord};
