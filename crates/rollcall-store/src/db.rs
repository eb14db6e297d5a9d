use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt row for {identity_id}: {reason}")]
    Corrupt { identity_id: String, reason: String },
}

/// Shared handle to the single database connection.
///
/// One connection behind a mutex serializes all SQL, which is the whole
/// concurrency story at target scale (tens to low-thousands of identities).
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("db mutex poisoned")
    }
}

/// Open (or create) the database file and initialize the schema.
pub fn open_db(path: &Path) -> Result<Db, StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    tracing::debug!(path = %path.display(), "database opened");
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

/// In-memory database, used by tests.
pub fn open_in_memory() -> Result<Db, StoreError> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS templates (
             identity_id   TEXT PRIMARY KEY,
             vector        BLOB NOT NULL,
             sample_count  INTEGER NOT NULL,
             model_version TEXT,
             created_at    TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS attendance (
             id          TEXT PRIMARY KEY,
             identity_id TEXT NOT NULL,
             date        TEXT NOT NULL,
             status      TEXT NOT NULL,
             time_in     TEXT,
             created_at  TEXT NOT NULL,
             UNIQUE (identity_id, date)
         );
         CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance (date);",
    )?;
    Ok(())
}
