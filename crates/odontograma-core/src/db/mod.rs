//! Database layer: JSON documents in SQLite collections.
//!
//! A document is addressed by `(collection, doc_id)`, where the collection is a slash path
//! such as `pacientes/{id}/odontograma`. Bodies are JSON objects checked by SQLite itself.

mod documents;
mod schema;

pub use documents::*;
pub use schema::*;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document not found: {collection}/{doc_id}")]
    MissingDocument { collection: String, doc_id: String },

    #[error("Document body is not a JSON object: {0}")]
    NotAnObject(String),
}

impl DbError {
    pub(crate) fn missing(collection: &str, doc_id: &str) -> Self {
        DbError::MissingDocument {
            collection: collection.to_string(),
            doc_id: doc_id.to_string(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Writers wait this long for a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Document store over one SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database file at `path`, creating it and its schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets readers on other connections proceed during a save
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened clinic database");
        Self::initialize(conn)
    }

    /// Private in-memory database, gone when dropped.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Raw connection, for diagnostics and tests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
