//! Work records tracked by the store.
//!
//! A record is one sentence-level unit of text awaiting (or having completed)
//! synthesis.

use serde::{Deserialize, Serialize};

/// A row of the work table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    /// Store-assigned primary key
    pub id: i64,

    /// Normalized sentence text (immutable once inserted)
    pub text: String,

    /// Set once, after the audio and sidecar are on disk
    pub complete: bool,
}

impl WorkRecord {
    /// Whether the record is still waiting for synthesis
    pub fn is_pending(&self) -> bool {
        !self.complete
    }
}

/// A `(text, complete)` pair ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub text: String,
    pub complete: bool,
}

impl NewRecord {
    /// A new record with `complete = false`
    pub fn pending(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            complete: false,
        }
    }
}

/// Completion counts for a work table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub complete: u64,
    pub pending: u64,
}

impl StoreStats {
    /// Fraction of records completed, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.complete as f64 / self.total as f64
        }
    }
}
