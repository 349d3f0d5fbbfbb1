//! Ingestion Integration Tests
//!
//! Tests for the parallel splitter/insert pool against a real database.

use std::collections::HashMap;

use speechbank::core::WorkStore;
use speechbank::ingest::{Document, IngestOptions, IngestionPool, SpellingNormalizer, TextSplitter};
use tempfile::TempDir;

fn splitter() -> TextSplitter {
    let mapping: HashMap<String, String> = [("colour", "color"), ("flavour", "flavor")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    TextSplitter::new(SpellingNormalizer::from_map(mapping))
}

fn corpus(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| {
            Document::new(format!(
                "Document {} has colour here. It also has\nflavour too. The end {}",
                i, i
            ))
        })
        .collect()
}

#[test]
fn test_pool_inserts_every_fragment() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("work.db");
    let docs = corpus(50);

    let options = IngestOptions {
        chunk_size: 7,
        batch_size: 10,
        workers: 4,
    };
    let pool = IngestionPool::new(&db, "en", splitter(), options);
    let report = pool.run(&docs).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.documents, 50);
    assert_eq!(report.chunks, 8); // ceil(50 / 7)
    assert_eq!(report.records_inserted, 150);

    let expected_splitter = splitter();
    let mut expected: Vec<String> = docs
        .iter()
        .flat_map(|d| expected_splitter.split(&d.text))
        .map(|r| r.text)
        .collect();
    expected.sort();

    let store = WorkStore::open(&db, "en").unwrap();
    let mut stored: Vec<String> = store
        .iter_pending()
        .map(|r| r.unwrap().text)
        .collect();
    stored.sort();

    assert_eq!(stored, expected);
    assert!(stored.contains(&"It also has flavor too".to_string()));
}

#[test]
fn test_single_worker_matches_many() {
    let temp = TempDir::new().unwrap();
    let docs = corpus(20);

    let mut totals = Vec::new();
    for workers in [1, 3] {
        let db = temp.path().join(format!("work-{}.db", workers));
        let options = IngestOptions {
            chunk_size: 4,
            batch_size: 100,
            workers,
        };
        let report = IngestionPool::new(&db, "en", splitter(), options)
            .run(&docs)
            .unwrap();
        totals.push(report.records_inserted);
    }

    assert_eq!(totals[0], totals[1]);
}

#[test]
fn test_empty_corpus() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("work.db");

    let report = IngestionPool::new(&db, "en", splitter(), IngestOptions::default())
        .run(&[])
        .unwrap();

    assert_eq!(report.chunks, 0);
    assert_eq!(report.records_inserted, 0);
    // Table still created up front
    assert_eq!(WorkStore::open(&db, "en").unwrap().stats().unwrap().total, 0);
}

#[test]
fn test_invalid_table_fails_before_fan_out() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("work.db");

    let result = IngestionPool::new(&db, "not a table", splitter(), IngestOptions::default())
        .run(&corpus(3));
    assert!(result.is_err());
}

#[test]
fn test_failing_chunk_does_not_stop_siblings() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("work.db");
    WorkStore::open(&db, "en").unwrap();
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_stop BEFORE INSERT ON en WHEN NEW.text = 'Stop' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

    let docs: Vec<Document> = (0..10)
        .map(|i| match i {
            5 => Document::new("Doc 5. Stop"),
            _ => Document::new(format!("Doc {}. Part {}", i, i)),
        })
        .collect();
    let options = IngestOptions {
        chunk_size: 2,
        batch_size: 100,
        workers: 3,
    };

    let report = IngestionPool::new(&db, "en", splitter(), options)
        .run(&docs)
        .unwrap();

    // Documents 4 and 5 share the rejected chunk; its single batch rolls back
    assert_eq!(report.chunks, 5);
    assert_eq!(report.failed_chunks, 1);
    assert_eq!(report.records_inserted, 16);
    assert_eq!(WorkStore::open(&db, "en").unwrap().stats().unwrap().total, 16);
}
