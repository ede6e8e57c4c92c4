use super::traits::{ParameterKind, ParameterStore, StorageError};
use crate::sink::traits::{check_append, sequence_token, LogEvent, LogSink, SinkError};
use async_trait::async_trait;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, String> {
    conn.lock()
        .map_err(|_| "connection mutex poisoned".to_string())
}

/// DuckDB-backed parameter store and ordered log sink.
///
/// Both live in one database file so a single connection serves a whole run.
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    /// Open (or create) the database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Database(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).inspect_err(|e| {
            // The lock is released when its holder exits, so the holder is alive
            if e.to_string().contains("Could not set lock") {
                tracing::error!(
                    path = %path.display(),
                    "Database is locked by another process; is another run in progress?"
                );
            }
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory DuckDB storage instance (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn).map_err(StorageError::Database)?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS parameters (
                    name VARCHAR PRIMARY KEY,
                    value VARCHAR NOT NULL,
                    kind VARCHAR NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS log_streams (
                    log_group VARCHAR NOT NULL,
                    log_stream VARCHAR NOT NULL,
                    sequence_token VARCHAR,
                    event_count BIGINT NOT NULL DEFAULT 0,
                    created_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (log_group, log_stream)
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS log_events (
                    log_group VARCHAR NOT NULL,
                    log_stream VARCHAR NOT NULL,
                    sequence BIGINT NOT NULL,
                    timestamp_ms BIGINT NOT NULL,
                    message VARCHAR NOT NULL,
                    ingestion_time TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (log_group, log_stream, sequence)
                )",
                [],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    /// All events of a stream in append order
    pub async fn read_events(&self, group: &str, stream: &str) -> Result<Vec<LogEvent>, StorageError> {
        let conn = self.conn.clone();
        let group = group.to_string();
        let stream = stream.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<LogEvent>, StorageError> {
            let conn = lock_conn(&conn).map_err(StorageError::Database)?;
            let mut stmt = conn.prepare(
                "SELECT timestamp_ms, message FROM log_events
                 WHERE log_group = ? AND log_stream = ?
                 ORDER BY sequence",
            )?;

            let rows = stmt.query_map(duckdb::params![group, stream], |row| {
                Ok(LogEvent {
                    timestamp: row.get(0)?,
                    message: row.get(1)?,
                })
            })?;

            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl ParameterStore for DuckDbStorage {
    async fn get_parameter(&self, name: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<String>, StorageError> {
            let conn = lock_conn(&conn).map_err(StorageError::Database)?;
            let mut stmt = conn.prepare("SELECT value FROM parameters WHERE name = ?")?;
            let mut rows = stmt.query(duckdb::params![name])?;

            match rows.next()? {
                Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        kind: ParameterKind,
    ) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let name = name.to_string();
        let value = value.to_string();
        let kind = match kind {
            ParameterKind::Plain => "plain",
            ParameterKind::Secure => "secure",
        };

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let conn = lock_conn(&conn).map_err(StorageError::Database)?;
            conn.execute(
                "INSERT INTO parameters (name, value, kind, updated_at)
                 VALUES (?, ?, ?, current_timestamp)
                 ON CONFLICT (name) DO UPDATE SET
                    value = excluded.value,
                    kind = excluded.kind,
                    updated_at = excluded.updated_at",
                duckdb::params![name, value, kind],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn delete_parameter(&self, name: &str) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let conn = lock_conn(&conn).map_err(StorageError::Database)?;
            conn.execute(
                "DELETE FROM parameters WHERE name = ?",
                duckdb::params![name],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl LogSink for DuckDbStorage {
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token_in: Option<&str>,
    ) -> Result<Option<String>, SinkError> {
        let conn = self.conn.clone();
        let group = group.to_string();
        let stream = stream.to_string();
        let events = events.to_vec();
        let provided = sequence_token_in.map(str::to_string);

        tokio::task::spawn_blocking(move || -> Result<Option<String>, SinkError> {
            let mut conn = lock_conn(&conn).map_err(SinkError::Database)?;
            let tx = conn.transaction()?;

            let (current_token, event_count) = {
                let mut stmt = tx.prepare(
                    "SELECT sequence_token, event_count FROM log_streams
                     WHERE log_group = ? AND log_stream = ?",
                )?;
                let mut rows = stmt.query(duckdb::params![group, stream])?;
                match rows.next()? {
                    Some(row) => (row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?),
                    None => {
                        return Err(SinkError::StreamNotFound {
                            group: group.clone(),
                            stream: stream.clone(),
                        })
                    }
                }
            };

            check_append(&events, current_token.as_deref(), provided.as_deref())?;

            {
                let mut insert = tx.prepare(
                    "INSERT INTO log_events
                        (log_group, log_stream, sequence, timestamp_ms, message, ingestion_time)
                     VALUES (?, ?, ?, ?, ?, current_timestamp)",
                )?;
                for (i, event) in events.iter().enumerate() {
                    insert.execute(duckdb::params![
                        group,
                        stream,
                        event_count + i as i64,
                        event.timestamp,
                        event.message,
                    ])?;
                }
            }

            let new_count = event_count + events.len() as i64;
            let next_token = sequence_token(new_count as u64);
            tx.execute(
                "UPDATE log_streams SET sequence_token = ?, event_count = ?
                 WHERE log_group = ? AND log_stream = ?",
                duckdb::params![next_token, new_count, group, stream],
            )?;

            tx.commit()?;
            Ok(Some(next_token))
        })
        .await
        .map_err(|e| SinkError::Database(format!("Task join error: {}", e)))?
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        let conn = self.conn.clone();
        let group = group.to_string();
        let stream = stream.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), SinkError> {
            let conn = lock_conn(&conn).map_err(SinkError::Database)?;
            let existing: i64 = conn.query_row(
                "SELECT count(*) FROM log_streams WHERE log_group = ? AND log_stream = ?",
                duckdb::params![group, stream],
                |row| row.get(0),
            )?;

            if existing > 0 {
                return Err(SinkError::StreamAlreadyExists { group, stream });
            }

            conn.execute(
                "INSERT INTO log_streams (log_group, log_stream, sequence_token, event_count, created_at)
                 VALUES (?, ?, NULL, 0, current_timestamp)",
                duckdb::params![group, stream],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| SinkError::Database(format!("Task join error: {}", e)))?
    }
}
