//! Parallel corpus ingestion.
//!
//! The corpus is cut into fixed-size chunks which are processed on a rayon
//! pool. Every chunk opens its own store connection, splits its documents
//! and inserts the fragments in sub-batches. Workers share nothing but the
//! read-only splitter; SQLite serializes the writes.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::corpus::Document;
use super::splitter::TextSplitter;
use crate::core::store::{StoreError, WorkStore};
use crate::domain::NewRecord;

/// Tuning for an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Documents per chunk (one unit of work and of progress)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Records per insert transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Worker threads (default: number of CPUs)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_chunk_size() -> usize {
    1024
}
fn default_batch_size() -> usize {
    100
}
fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            batch_size: default_batch_size(),
            workers: default_workers(),
        }
    }
}

/// Summary of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
    pub records_inserted: usize,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failed_chunks == 0
    }
}

/// A chunk that stopped partway through
#[derive(Debug, Error)]
#[error("{source} ({committed} records already committed)")]
pub struct ChunkError {
    /// Records stored by earlier batches of the chunk
    pub committed: usize,

    #[source]
    pub source: StoreError,
}

/// Fan-out/fan-in ingestion into one work table
pub struct IngestionPool {
    db_path: PathBuf,
    table: String,
    splitter: TextSplitter,
    options: IngestOptions,
}

impl IngestionPool {
    pub fn new(
        db_path: impl Into<PathBuf>,
        table: impl Into<String>,
        splitter: TextSplitter,
        options: IngestOptions,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            table: table.into(),
            splitter,
            options,
        }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Ingest every document, blocking until all chunks are done.
    ///
    /// A chunk that fails (or panics) is logged and counted; the other
    /// chunks still run to completion.
    #[tracing::instrument(skip_all, fields(table = %self.table, documents = documents.len()))]
    pub fn run(&self, documents: &[Document]) -> Result<IngestReport> {
        // Fail fast on an unreachable database and create the table once,
        // before workers race to do it.
        WorkStore::open(&self.db_path, &self.table).with_context(|| {
            format!("Failed to open work store: {}", self.db_path.display())
        })?;

        self.run_chunks(documents, |chunk| self.ingest_chunk(chunk))
    }

    /// Fan `documents` out in chunks over the pool and collect the outcomes
    fn run_chunks<F>(&self, documents: &[Document], ingest: F) -> Result<IngestReport>
    where
        F: Fn(&[Document]) -> Result<usize, ChunkError> + Sync,
    {
        let chunk_size = self.options.chunk_size.max(1);
        let total = documents.len().div_ceil(chunk_size);
        let workers = self.options.workers.max(1);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ingest-{}", i))
            .build()
            .context("Failed to build ingestion pool")?;

        tracing::info!(chunks = total, workers, "Starting ingestion");

        let done = AtomicUsize::new(0);
        let outcomes: Vec<(usize, bool)> = pool.install(|| {
            documents
                .par_chunks(chunk_size)
                .enumerate()
                .map(|(index, chunk)| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| ingest(chunk)));
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;

                    match outcome {
                        Ok(Ok(inserted)) => {
                            tracing::info!(
                                chunk = index,
                                inserted,
                                "Chunk ingested ({}/{})",
                                finished,
                                total
                            );
                            (inserted, true)
                        }
                        Ok(Err(e)) => {
                            tracing::error!(
                                chunk = index,
                                "Chunk failed ({}/{}): {}",
                                finished,
                                total,
                                e
                            );
                            (e.committed, false)
                        }
                        Err(_) => {
                            tracing::error!(
                                chunk = index,
                                "Chunk worker panicked ({}/{})",
                                finished,
                                total
                            );
                            (0, false)
                        }
                    }
                })
                .collect()
        });

        let report = IngestReport {
            documents: documents.len(),
            chunks: outcomes.len(),
            failed_chunks: outcomes.iter().filter(|(_, ok)| !ok).count(),
            records_inserted: outcomes.iter().map(|(inserted, _)| inserted).sum(),
        };

        tracing::info!(
            inserted = report.records_inserted,
            failed_chunks = report.failed_chunks,
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Split and insert one chunk on the calling worker's own connection
    fn ingest_chunk(&self, chunk: &[Document]) -> Result<usize, ChunkError> {
        let mut store = WorkStore::open(&self.db_path, &self.table)
            .map_err(|source| ChunkError { committed: 0, source })?;
        ingest_documents(&mut store, &self.splitter, chunk, self.options.batch_size)
    }
}

/// Split documents and insert the fragments in batches of `batch_size`.
///
/// Batches land in the order the fragments were produced. On failure the
/// error carries how many records earlier batches already committed.
pub fn ingest_documents(
    store: &mut WorkStore,
    splitter: &TextSplitter,
    documents: &[Document],
    batch_size: usize,
) -> Result<usize, ChunkError> {
    let batch_size = batch_size.max(1);
    let mut batch: Vec<NewRecord> = Vec::with_capacity(batch_size);
    let mut inserted = 0;

    for fragment in documents.iter().flat_map(|doc| splitter.split(&doc.text)) {
        batch.push(fragment);
        if batch.len() == batch_size {
            flush(store, &mut batch, &mut inserted)?;
        }
    }
    flush(store, &mut batch, &mut inserted)?;

    Ok(inserted)
}

fn flush(
    store: &mut WorkStore,
    batch: &mut Vec<NewRecord>,
    inserted: &mut usize,
) -> Result<(), ChunkError> {
    let count = store.insert_batch(batch).map_err(|source| ChunkError {
        committed: *inserted,
        source,
    })?;
    *inserted += count;
    batch.clear();
    Ok(())
}

/// Convenience for callers that only have a path
pub fn ingest_file(pool: &IngestionPool, corpus: &Path) -> Result<IngestReport> {
    let documents = super::corpus::read_jsonl(corpus)?;
    pool.run(&documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_batches_preserve_order() {
        let mut store = WorkStore::open_in_memory("en").unwrap();
        let splitter = TextSplitter::default();
        let docs = vec![
            Document::new("One. Two. Three"),
            Document::new("Four. Five"),
        ];

        let inserted = ingest_documents(&mut store, &splitter, &docs, 2).unwrap();
        assert_eq!(inserted, 5);

        let texts: Vec<String> = (1..=5)
            .map(|id| store.get(id).unwrap().unwrap().text)
            .collect();
        assert_eq!(texts, vec!["One", "Two", "Three", "Four", "Five"]);
    }

    #[test]
    fn test_failed_batch_reports_committed_records() {
        let temp = tempfile::TempDir::new().unwrap();
        let db = temp.path().join("work.db");
        let mut store = WorkStore::open(&db, "en").unwrap();
        rusqlite::Connection::open(&db)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_stop BEFORE INSERT ON en WHEN NEW.text = 'Stop' \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let docs = vec![Document::new("One. Two. Three. Stop. Five")];
        let err = ingest_documents(&mut store, &TextSplitter::default(), &docs, 2).unwrap_err();

        assert_eq!(err.committed, 2);
        assert_eq!(store.stats().unwrap().total, 2);
    }

    #[test]
    fn test_failing_and_panicking_chunks_are_contained() {
        let temp = tempfile::TempDir::new().unwrap();
        let options = IngestOptions {
            chunk_size: 2,
            batch_size: 10,
            workers: 3,
        };
        let pool = IngestionPool::new(
            temp.path().join("work.db"),
            "en",
            TextSplitter::default(),
            options,
        );
        let docs: Vec<Document> = ["a", "b", "panic", "c", "fail", "d", "e", "f"]
            .into_iter()
            .map(Document::new)
            .collect();

        let report = pool
            .run_chunks(&docs, |chunk| {
                if chunk.iter().any(|d| d.text == "panic") {
                    panic!("worker crashed");
                }
                if chunk.iter().any(|d| d.text == "fail") {
                    return Err(ChunkError {
                        committed: 1,
                        source: StoreError::NotFound(0),
                    });
                }
                Ok(chunk.len())
            })
            .unwrap();

        assert_eq!(report.chunks, 4);
        assert_eq!(report.failed_chunks, 2);
        assert_eq!(report.records_inserted, 5);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_default_options() {
        let options = IngestOptions::default();
        assert_eq!(options.chunk_size, 1024);
        assert_eq!(options.batch_size, 100);
        assert!(options.workers >= 1);
    }
}
