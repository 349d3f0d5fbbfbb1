//! Corpus ingestion pipeline.
//!
//! ```text
//! corpus.jsonl → chunks → [worker: normalize → split → insert_batch] → work table
//! ```
//!
//! 1. **Normalizer**: British → American spelling table
//! 2. **Splitter**: sentence-level fragments
//! 3. **Pool**: rayon workers, one store connection each

pub mod corpus;
pub mod normalizer;
pub mod pool;
pub mod splitter;

// Re-export key types
pub use corpus::{read_jsonl, Document};
pub use normalizer::SpellingNormalizer;
pub use pool::{ingest_documents, ChunkError, IngestOptions, IngestReport, IngestionPool};
pub use splitter::{Fragments, TextSplitter};
