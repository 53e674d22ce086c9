//! Record persistence
//!
//! The aggregator hands every filtered batch to a [`RecordStore`]. The SQLite
//! implementation upserts on the record's canonical JSON, so saving the same
//! record again keeps a single row.

use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::data::Record;

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected the operation
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A record could not be encoded for storage
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persistence collaborator used by the aggregator
pub trait RecordStore: Send + Sync {
    /// Upserts every record in `records`
    fn save_all(&self, records: &[Record]) -> Result<(), StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS data_aggregation (
    record_key   TEXT PRIMARY KEY,
    product_name TEXT NOT NULL,
    payload      TEXT NOT NULL,
    saved_at     TEXT NOT NULL
);
";

/// SQLite-backed record store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of distinct records stored
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM data_aggregation", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Loads every stored record, oldest save first
    pub fn load_all(&self) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT payload FROM data_aggregation ORDER BY saved_at, rowid")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }
}

impl RecordStore for SqliteStore {
    fn save_all(&self, records: &[Record]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let saved_at = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO data_aggregation (record_key, product_name, payload, saved_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(record_key) DO UPDATE SET saved_at = excluded.saved_at",
            )?;
            for record in records {
                let payload = serde_json::to_string(record)?;
                stmt.execute(params![payload, record.product_name, payload, saved_at])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = records.len(), "Saved records");
        Ok(())
    }
}
