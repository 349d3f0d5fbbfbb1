//! Core pipeline logic.
//!
//! This module contains:
//! - WorkStore: SQLite work table with completion tracking
//! - SynthesisDriver: Pending-record consumer
//! - Archiver: Tar sharding with a resumable manifest

pub mod archiver;
pub mod driver;
pub mod store;

// Re-export commonly used types
pub use archiver::{ArchiveError, ArchiveOptions, ArchiveReport, Archiver, Manifest, ShardInfo};
pub use driver::{DriverOptions, DriverReport, SynthesisDriver};
pub use store::{Pending, StoreError, WorkStore};
