//! SQLite Message Log
//!
//! Local mirror of the device `sms` table, using the Android telephony
//! column names.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE sms (
//!     _id TEXT PRIMARY KEY NOT NULL,
//!     thread_id TEXT,
//!     address TEXT,
//!     body TEXT,
//!     date INTEGER NOT NULL,
//!     type INTEGER NOT NULL DEFAULT 1
//! );
//!
//! CREATE INDEX idx_sms_date ON sms(date DESC);
//! CREATE INDEX idx_sms_thread ON sms(thread_id, date);
//! ```
//!
//! NULL `thread_id`, `address` and `body` read back as empty strings so the
//! aggregator can decide what to do with them. Integer and text values are
//! both accepted in the id columns. A row whose `date` or `type` cannot be
//! read as an integer is skipped with a warning; the rest of the query still
//! answers.

use crate::format::now_millis;
use crate::record::{Direction, MessageRecord};
use crate::source::{RecordQuery, RecordSource, Transport};
use crate::{InboxError, Result};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// SQLite-backed record source and loopback transport
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the message log at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        info!("Opened message log at {}", path.display());
        Ok(store)
    }

    /// Open a throwaway in-memory log
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sms (
                _id TEXT PRIMARY KEY NOT NULL,
                thread_id TEXT,
                address TEXT,
                body TEXT,
                date INTEGER NOT NULL,
                type INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_sms_date ON sms(date DESC);
            CREATE INDEX IF NOT EXISTS idx_sms_thread ON sms(thread_id, date);
            "#,
        )?;

        debug!("Message log schema initialized");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| InboxError::Source(format!("Lock error: {}", e)))
    }

    /// Insert or replace a single record
    pub fn insert(&self, record: &MessageRecord) -> Result<()> {
        let conn = self.lock()?;
        insert_record(&conn, record)?;
        Ok(())
    }

    /// Insert or replace many records in one transaction
    pub fn import(&self, records: &[MessageRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in records {
            insert_record(&tx, record)?;
        }
        tx.commit()?;

        info!("Imported {} records into message log", records.len());
        Ok(records.len())
    }

    /// Total number of rows
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sms", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Thread a send to `address` will land in
    ///
    /// The latest thread with that address, or the next unused numeric id.
    pub fn thread_for_address(&self, address: &str) -> Result<String> {
        let conn = self.lock()?;
        Self::resolve_thread(&conn, address)
    }

    fn resolve_thread(conn: &Connection, address: &str) -> Result<String> {
        let existing: Option<Value> = conn
            .query_row(
                "SELECT thread_id FROM sms
                 WHERE address = ?1 AND thread_id IS NOT NULL AND thread_id != ''
                 ORDER BY date DESC LIMIT 1",
                params![address],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(thread_id) = existing.map(value_to_string) {
            if !thread_id.is_empty() {
                return Ok(thread_id);
            }
        }

        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(CAST(thread_id AS INTEGER)), 0) + 1 FROM sms",
            [],
            |row| row.get(0),
        )?;
        Ok(next.to_string())
    }
}

fn insert_record(conn: &Connection, record: &MessageRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR REPLACE INTO sms (_id, thread_id, address, body, date, type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            (!record.thread_id.is_empty()).then_some(&record.thread_id),
            record.address,
            record.body,
            record.timestamp_millis,
            record.direction.to_message_type(),
        ],
    )
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: value_to_string(row.get(0)?),
        thread_id: value_to_string(row.get(1)?),
        address: value_to_string(row.get(2)?),
        body: value_to_string(row.get(3)?),
        timestamp_millis: row.get(4)?,
        direction: Direction::from_message_type(row.get(5)?),
    })
}

/// Keep the rows that convert, drop the ones that don't
fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<MessageRecord>>,
) -> Result<Vec<MessageRecord>> {
    let mut records = Vec::new();
    for row in rows {
        match row {
            Ok(record) => records.push(record),
            Err(
                e @ (rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::IntegralValueOutOfRange(..)),
            ) => {
                let error = InboxError::DataQuality(format!("unreadable row: {}", e));
                warn!("Skipping record: {}", error);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(records)
}

#[async_trait]
impl RecordSource for SqliteStore {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<MessageRecord>> {
        let conn = self.lock()?;
        let order = query.direction.as_sql();

        let records = match &query.thread_id {
            Some(thread_id) => {
                let sql = format!(
                    "SELECT _id, thread_id, address, body, date, type FROM sms
                     WHERE thread_id = ?1 ORDER BY date {order}, rowid"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![thread_id], row_to_record)?;
                collect_records(rows)?
            }
            None => {
                let sql = format!(
                    "SELECT _id, thread_id, address, body, date, type FROM sms
                     ORDER BY date {order}, rowid"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_record)?;
                collect_records(rows)?
            }
        };

        debug!(
            "Message log answered query (thread {:?}, {}): {} records",
            query.thread_id,
            order,
            records.len()
        );
        Ok(records)
    }
}

#[async_trait]
impl Transport for SqliteStore {
    async fn send(&self, address: &str, body: &str) -> Result<()> {
        let conn = self.lock()?;
        let thread_id = Self::resolve_thread(&conn, address)?;
        let record = MessageRecord::outgoing(thread_id, address, body, now_millis());

        insert_record(&conn, &record)
            .map_err(|e| InboxError::Transport(format!("Failed to queue message: {}", e)))?;

        info!(
            "Queued outgoing message {} to {} in thread {}",
            record.id, address, record.thread_id
        );
        Ok(())
    }
}
