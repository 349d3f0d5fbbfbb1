//! Adapter interfaces for external TTS models.
//!
//! The pipeline treats the model as a black box: text in, mono samples plus
//! a sample rate out. Implementations may be slow or GPU-bound; callers make
//! no latency assumptions.

pub mod command;
pub mod models;
pub mod wav;

use thiserror::Error;

// Re-export the shipped backend
pub use command::CommandSynthesizer;
pub use models::{ModelSpec, KNOWN_MODELS};

/// Errors a synthesis backend can report
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Synthesis backend failed: {0}")]
    Backend(String),

    #[error("Synthesis produced no audio")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),
}

/// Audio returned by a synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Mono samples in `[-1, 1]`
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Synthesis {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length of the clip in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Trait for TTS backends
pub trait Synthesizer: Send {
    /// Model identifier recorded as provenance
    fn model_id(&self) -> &str;

    /// Language of the text this model speaks
    fn language(&self) -> &str;

    /// Turn one sentence into audio
    fn synthesize(&mut self, text: &str) -> Result<Synthesis, SynthesisError>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for &mut S {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn language(&self) -> &str {
        (**self).language()
    }

    fn synthesize(&mut self, text: &str) -> Result<Synthesis, SynthesisError> {
        (**self).synthesize(text)
    }
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn language(&self) -> &str {
        (**self).language()
    }

    fn synthesize(&mut self, text: &str) -> Result<Synthesis, SynthesisError> {
        (**self).synthesize(text)
    }
}
