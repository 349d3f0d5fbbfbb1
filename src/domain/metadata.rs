//! Sidecar metadata written next to every synthesized sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of `{id}.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// File name of the audio file (no directory)
    pub filename: String,

    /// Source text; a list to match the dataset loader's caption format
    pub text: Vec<String>,

    /// Provenance of the sample
    pub original_data: Provenance,

    /// Sample rate of the audio file in Hz
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,

    /// When the sample was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Where a sample came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Language of the source text (e.g. "en")
    pub language: String,

    /// Model identifier used for synthesis
    pub model: String,
}

impl SampleMetadata {
    /// Build the sidecar for a freshly synthesized record
    pub fn new(
        filename: impl Into<String>,
        text: impl Into<String>,
        original_data: Provenance,
    ) -> Self {
        Self {
            filename: filename.into(),
            text: vec![text.into()],
            original_data,
            sample_rate: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }
}
