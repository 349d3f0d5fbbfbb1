//! Work Store Integration Tests
//!
//! Tests for batch insertion, pending iteration and completion marking.

use std::thread;

use speechbank::core::{StoreError, WorkStore};
use speechbank::domain::{NewRecord, WorkRecord};
use tempfile::TempDir;

fn pending(store: &WorkStore) -> Vec<WorkRecord> {
    store
        .iter_pending()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_insert_then_mark_scenario() {
    let mut store = WorkStore::open_in_memory("en").unwrap();

    store
        .insert_batch(&[
            NewRecord::pending("Hello world."),
            NewRecord::pending("It is sunny."),
        ])
        .unwrap();

    // Store-assigned ids
    let mut ids: Vec<i64> = pending(&store).iter().map(|r| r.id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);

    assert!(store.mark_complete(1).unwrap());

    let remaining = pending(&store);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 2);
    assert_eq!(remaining[0].text, "It is sunny.");
    assert!(!remaining[0].complete);
}

#[test]
fn test_mark_complete_is_idempotent() {
    let mut store = WorkStore::open_in_memory("en").unwrap();
    store.insert_batch(&[NewRecord::pending("Once.")]).unwrap();

    assert!(store.mark_complete(1).unwrap());
    assert!(!store.mark_complete(1).unwrap());

    let record = store.get(1).unwrap().unwrap();
    assert!(record.complete);
    assert!(pending(&store).is_empty());

    let stats = store.stats().unwrap();
    assert_eq!((stats.total, stats.complete, stats.pending), (1, 1, 0));
}

#[test]
fn test_pending_matches_inserted_regardless_of_batch_size() {
    let texts: Vec<String> = (0..37).map(|i| format!("Sentence number {}", i)).collect();

    for batch_size in [1, 3, 10, 100] {
        let mut store = WorkStore::open_in_memory("en").unwrap();
        for chunk in texts.chunks(batch_size) {
            let batch: Vec<NewRecord> = chunk.iter().map(NewRecord::pending).collect();
            store.insert_batch(&batch).unwrap();
        }

        let mut got: Vec<String> = pending(&store).into_iter().map(|r| r.text).collect();
        got.sort();
        let mut expected = texts.clone();
        expected.sort();
        assert_eq!(got, expected, "batch size {}", batch_size);
    }
}

#[test]
fn test_tables_are_independent() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("work.db");

    let mut en = WorkStore::open(&db, "en").unwrap();
    let mut es = WorkStore::open(&db, "es").unwrap();
    en.insert_batch(&[NewRecord::pending("Hello.")]).unwrap();
    es.insert_batch(&[NewRecord::pending("Hola."), NewRecord::pending("Adios.")])
        .unwrap();

    assert_eq!(en.stats().unwrap().total, 1);
    assert_eq!(es.stats().unwrap().total, 2);
    assert!(matches!(en.mark_complete(2), Err(StoreError::NotFound(2))));
}

#[test]
fn test_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("work.db");

    {
        let mut store = WorkStore::open(&db, "en").unwrap();
        store
            .insert_batch(&[NewRecord::pending("a"), NewRecord::pending("b")])
            .unwrap();
        store.mark_complete(1).unwrap();
    }

    let store = WorkStore::open(&db, "en").unwrap();
    let remaining = pending(&store);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 2);
}

#[test]
fn test_concurrent_writers_on_separate_connections() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("work.db");
    WorkStore::open(&db, "en").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let db = db.clone();
            thread::spawn(move || {
                let mut store = WorkStore::open(&db, "en").unwrap();
                for batch in 0..5 {
                    let records: Vec<NewRecord> = (0..20)
                        .map(|i| NewRecord::pending(format!("w{} b{} r{}", worker, batch, i)))
                        .collect();
                    store.insert_batch(&records).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let store = WorkStore::open(&db, "en").unwrap();
    assert_eq!(store.stats().unwrap().total, 4 * 5 * 20);
    assert_eq!(pending(&store).len(), 400);
}
