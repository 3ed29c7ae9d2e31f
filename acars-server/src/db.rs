//! Message persistence: the `MessageStore` capability and its SQLite backend.
//!
//! Schema: a single `acars` table keyed by
//! (date, registration, flight, mode, label, block_id, msg_id), so a
//! retransmission received the same day collides with the stored copy.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{ffi, params, Connection, ErrorCode, Result as SqlResult};
use serde::Serialize;
use thiserror::Error;

use acars_core::routing::OnceKey;
use acars_core::types::AcarsMessage;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS acars (
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    frequency TEXT,
    registration TEXT NOT NULL,
    flight TEXT NOT NULL,
    mode TEXT NOT NULL,
    label TEXT NOT NULL,
    block_id TEXT NOT NULL,
    msg_id TEXT NOT NULL,
    text TEXT NOT NULL,
    PRIMARY KEY (date, registration, flight, mode, label, block_id, msg_id)
);

CREATE INDEX IF NOT EXISTS idx_acars_datetime ON acars(date, time);
CREATE INDEX IF NOT EXISTS idx_acars_registration ON acars(registration);
CREATE INDEX IF NOT EXISTS idx_acars_flight ON acars(flight);
"#;

const INSERT_SQL: &str = "INSERT INTO acars
     (date, time, frequency, registration, flight, mode, label, block_id, msg_id, text)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const INSERT_IF_ABSENT_SQL: &str = "INSERT INTO acars
     (date, time, frequency, registration, flight, mode, label, block_id, msg_id, text)
     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
     WHERE NOT EXISTS (
         SELECT 1 FROM acars WHERE date = ?11 AND flight = ?12 AND registration = ?13
     )";

// ---------------------------------------------------------------------------
// Store capability
// ---------------------------------------------------------------------------

/// Storage failures, split so the router can tell a retransmission from a
/// real problem.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Primary key / unique constraint rejected the row.
    #[error("duplicate message")]
    Duplicate,
    #[error("storage error: {0}")]
    Backend(String),
    #[error("unsupported database URL: {0}")]
    Unsupported(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation
                    && matches!(
                        failure.extended_code,
                        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                    ) =>
            {
                StoreError::Duplicate
            }
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

/// Row counts for the `stats` command.
#[derive(Debug, Default, Serialize)]
pub struct StoreStats {
    pub messages: i64,
    /// (label, count), most frequent first.
    pub by_label: Vec<(String, i64)>,
}

/// Where accepted messages go. Implemented by [`Database`] (SQLite) and,
/// with the `postgres` feature, by `db_pg::PgStore`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create the table and indexes if they don't exist.
    async fn setup_schema(&self) -> Result<(), StoreError>;

    /// Store unconditionally. [`StoreError::Duplicate`] on key collision.
    async fn insert(&self, message: &AcarsMessage) -> Result<(), StoreError>;

    /// Store only if no row matches `key`. Returns rows affected (0 or 1).
    async fn insert_if_absent(
        &self,
        key: &OnceKey,
        message: &AcarsMessage,
    ) -> Result<u64, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Open the store named by a connection string.
///
/// `postgres://` / `postgresql://` URLs need the `postgres` feature; anything
/// else is a SQLite path, optionally prefixed with `sqlite://`.
pub async fn open_store(url: &str) -> Result<Arc<dyn MessageStore>, StoreError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return open_postgres(url).await;
    }

    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    Ok(Arc::new(Database::open(path)?))
}

/// Open `url` and read its row counts. The schema is created first, so a
/// store nothing has been written to yet reports zero messages.
pub async fn read_stats(url: &str) -> Result<StoreStats, StoreError> {
    let store = open_store(url).await?;
    store.setup_schema().await?;
    store.stats().await
}

#[cfg(feature = "postgres")]
async fn open_postgres(url: &str) -> Result<Arc<dyn MessageStore>, StoreError> {
    Ok(Arc::new(crate::db_pg::PgStore::connect(url).await?))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(url: &str) -> Result<Arc<dyn MessageStore>, StoreError> {
    Err(StoreError::Unsupported(format!(
        "{url} (built without the `postgres` feature)"
    )))
}

/// Column values shared by both insert statements and backends.
pub(crate) struct MessageRow<'a> {
    pub date: String,
    pub time: String,
    pub frequency: Option<&'a str>,
    pub registration: &'a str,
    pub flight: &'a str,
    pub mode: String,
    pub label: &'a str,
    pub block_id: String,
    pub msg_id: &'a str,
    pub text: &'a str,
}

impl<'a> MessageRow<'a> {
    pub fn of(message: &'a AcarsMessage) -> Self {
        MessageRow {
            date: message.timestamp.format("%Y-%m-%d").to_string(),
            time: message.timestamp.format("%H:%M:%S").to_string(),
            frequency: message.frequency.as_deref(),
            registration: &message.registration,
            flight: &message.flight_id,
            mode: message.mode.to_string(),
            label: &message.label,
            block_id: message.block_id.to_string(),
            msg_id: &message.msg_id,
            text: &message.text,
        }
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// SQLite database for received ACARS messages.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &str) -> SqlResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = Path::new(path).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn
        };

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> SqlResult<Self> {
        Self::open(":memory:")
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> SqlResult<T>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".into()))?;
        Ok(f(&*conn)?)
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn setup_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.execute_batch(SCHEMA))
    }

    async fn insert(&self, message: &AcarsMessage) -> Result<(), StoreError> {
        let row = MessageRow::of(message);
        self.with_conn(|conn| {
            conn.execute(
                INSERT_SQL,
                params![
                    row.date,
                    row.time,
                    row.frequency,
                    row.registration,
                    row.flight,
                    row.mode,
                    row.label,
                    row.block_id,
                    row.msg_id,
                    row.text,
                ],
            )
        })?;
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        key: &OnceKey,
        message: &AcarsMessage,
    ) -> Result<u64, StoreError> {
        let row = MessageRow::of(message);
        let key_date = key.date.format("%Y-%m-%d").to_string();
        let rows = self.with_conn(|conn| {
            conn.execute(
                INSERT_IF_ABSENT_SQL,
                params![
                    row.date,
                    row.time,
                    row.frequency,
                    row.registration,
                    row.flight,
                    row.mode,
                    row.label,
                    row.block_id,
                    row.msg_id,
                    row.text,
                    key_date,
                    key.flight_id,
                    key.registration,
                ],
            )
        })?;
        Ok(rows as u64)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.with_conn(|conn| {
            let messages = conn.query_row("SELECT COUNT(*) FROM acars", [], |r| r.get(0))?;

            let mut stmt = conn.prepare(
                "SELECT label, COUNT(*) AS n FROM acars GROUP BY label ORDER BY n DESC, label",
            )?;
            let by_label = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<SqlResult<Vec<(String, i64)>>>()?;

            Ok(StoreStats { messages, by_label })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
