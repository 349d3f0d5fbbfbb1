//! speechbank - Batch text-to-speech dataset builder
//!
//! Turns a large text corpus into audio/text pairs packed in tar shards.
//!
//! # Architecture
//!
//! The pipeline is built around a persistent work table:
//! - Ingestion splits the corpus into sentences and queues them in SQLite
//! - The driver synthesizes pending records and marks each one complete
//!   only after its audio and sidecar are on disk
//! - The archiver packs finished samples into fixed-size shards and keeps a
//!   manifest of every shard written
//!
//! # Modules
//!
//! - `adapters`: TTS backends (external program, model catalog, WAV I/O)
//! - `core`: WorkStore, SynthesisDriver, Archiver
//! - `domain`: Data structures (WorkRecord, SampleMetadata)
//! - `ingest`: Corpus reading, normalization, splitting, worker pool
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Queue a corpus
//! speechbank ingest wikipedia_en.jsonl --table en
//!
//! # Synthesize pending records, archiving every 10k
//! speechbank synthesize --table en --program piper \
//!     --arg --model --arg en_US-lessac-medium.onnx --arg --output_file --arg '{output}'
//!
//! # Check progress
//! speechbank status --table en
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use adapters::{Synthesis, SynthesisError, Synthesizer};
pub use core::{ArchiveOptions, Archiver, DriverOptions, SynthesisDriver, WorkStore};
pub use domain::{NewRecord, SampleMetadata, WorkRecord};
pub use ingest::{IngestOptions, IngestionPool, SpellingNormalizer, TextSplitter};
