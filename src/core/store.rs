//! SQLite-backed work table.
//!
//! One store instance is bound to one table. Every worker that writes to the
//! table opens its own `WorkStore`; SQLite's locking (with a generous busy
//! timeout) is the only coordination between them.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::domain::{NewRecord, StoreStats, WorkRecord};

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(100);

/// Rows fetched per round trip by [`Pending`]
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Errors that can occur with the work store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistent queue of `(id, text, complete)` records
pub struct WorkStore {
    conn: Connection,
    table: String,
}

impl WorkStore {
    /// Open (or create) the database at `path` and make sure `table` exists
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), table, journal_mode = %mode, "Opened work store");

        let store = Self {
            conn,
            table: table.to_string(),
        };
        store.ensure_table()?;
        Ok(store)
    }

    /// Private in-memory store (tests, dry runs)
    pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        let store = Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
        };
        store.ensure_table()?;
        Ok(store)
    }

    /// Name of the bound table
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table if it does not exist yet
    pub fn ensure_table(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (id INTEGER PRIMARY KEY, text TEXT, complete BOOLEAN)",
            self.table
        ))?;
        Ok(())
    }

    /// Insert many records in one transaction.
    ///
    /// Either every record lands or none does. Returns the number inserted.
    pub fn insert_batch(&mut self, records: &[NewRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO \"{}\" (text, complete) VALUES (?1, ?2)",
            self.table
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for record in records {
                stmt.execute(params![record.text, record.complete])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    /// Lazily iterate every record with `complete = false`.
    ///
    /// Rows are fetched a page at a time, so records may be marked complete
    /// while iterating. The order is unspecified.
    pub fn iter_pending(&self) -> Pending<'_> {
        Pending {
            store: self,
            after_id: i64::MIN,
            page: VecDeque::new(),
            page_size: DEFAULT_PAGE_SIZE,
            exhausted: false,
        }
    }

    fn pending_page(&self, after_id: i64, limit: usize) -> Result<Vec<WorkRecord>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT id, text, complete FROM \"{}\" WHERE complete = 0 AND id > ?1 ORDER BY id LIMIT ?2",
            self.table
        ))?;

        let rows = stmt.query_map(params![after_id, limit as i64], map_record)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Mark a record complete.
    ///
    /// Returns `true` if this call flipped the flag, `false` if the record
    /// was already complete.
    pub fn mark_complete(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE \"{}\" SET complete = 1 WHERE id = ?1 AND complete = 0",
                self.table
            ),
            params![id],
        )?;

        if changed > 0 {
            return Ok(true);
        }

        match self.get(id)? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Fetch a single record by id
    pub fn get(&self, id: i64) -> Result<Option<WorkRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, text, complete FROM \"{}\" WHERE id = ?1",
                    self.table
                ),
                params![id],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Count total, complete and pending records
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let (total, complete): (i64, i64) = self.conn.query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(complete), 0) FROM \"{}\"",
                self.table
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let total = total.max(0) as u64;
        let complete = complete.max(0) as u64;
        Ok(StoreStats {
            total,
            complete,
            pending: total.saturating_sub(complete),
        })
    }
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkRecord> {
    Ok(WorkRecord {
        id: row.get(0)?,
        text: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        complete: row.get(2)?,
    })
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(name.to_string()))
    }
}

/// Lazy iterator over pending records, see [`WorkStore::iter_pending`]
pub struct Pending<'a> {
    store: &'a WorkStore,
    after_id: i64,
    page: VecDeque<WorkRecord>,
    page_size: usize,
    exhausted: bool,
}

impl Pending<'_> {
    /// Override the number of rows fetched per query
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl Iterator for Pending<'_> {
    type Item = Result<WorkRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            match self.store.pending_page(self.after_id, self.page_size) {
                Ok(rows) => {
                    if rows.len() < self.page_size {
                        self.exhausted = true;
                    }
                    self.page.extend(rows);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }

        let record = self.page.pop_front()?;
        self.after_id = record.id;
        Some(Ok(record))
    }
}
