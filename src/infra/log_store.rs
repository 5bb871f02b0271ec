use super::fresh_etag;
use crate::app::ports::LogStore;
use crate::domain::{IngestStatus, LogEntity, LogRecord};
use crate::error::{Result, WeatherError};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    CREATE TABLE IF NOT EXISTS weather_logs (
        partition_key    TEXT NOT NULL,
        row_key          TEXT NOT NULL,
        timestamp_ms     INTEGER NOT NULL,
        status           TEXT NOT NULL,
        status_code      INTEGER,
        payload_locator  TEXT,
        etag             TEXT NOT NULL,
        PRIMARY KEY (partition_key, row_key)
    );
    CREATE INDEX IF NOT EXISTS weather_logs_by_time
        ON weather_logs (partition_key, timestamp_ms);
"#;

/// Ingest log table backed by a SQLite file.
pub struct SqliteLogStore {
    conn: Arc<Mutex<Connection>>,
}

struct RawRow {
    partition_key: String,
    row_key: String,
    timestamp_ms: i64,
    status: String,
    status_code: Option<i64>,
    payload_locator: Option<String>,
    etag: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            partition_key: row.get(0)?,
            row_key: row.get(1)?,
            timestamp_ms: row.get(2)?,
            status: row.get(3)?,
            status_code: row.get(4)?,
            payload_locator: row.get(5)?,
            etag: row.get(6)?,
        })
    }

    fn into_entity(self) -> Result<LogEntity> {
        let corrupt = |what: &str| {
            WeatherError::StoreUnavailable(format!("corrupt {} in row {}", what, self.row_key))
        };
        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp_ms)
            .single()
            .ok_or_else(|| corrupt("timestamp"))?;
        let status = IngestStatus::parse(&self.status).ok_or_else(|| corrupt("status"))?;
        let status_code = self.status_code.and_then(|c| u16::try_from(c).ok());
        Ok(LogEntity {
            record: LogRecord {
                partition_key: self.partition_key,
                row_key: self.row_key,
                timestamp,
                status,
                status_code,
                payload_locator: self.payload_locator,
            },
            etag: self.etag,
        })
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| WeatherError::StoreUnavailable("log store connection poisoned".into()))
}

const COLUMNS: &str =
    "partition_key, row_key, timestamp_ms, status, status_code, payload_locator, etag";

impl SqliteLogStore {
    /// Opens the database, creating the log table when it is missing.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let store = Self::open_existing(db_path.as_ref())?;
        store.lock()?.execute_batch(SCHEMA)?;
        info!(path = %db_path.as_ref().display(), "weather log table ready");
        Ok(store)
    }

    /// Opens the database without touching its schema.
    pub fn open_existing<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock_conn(&self.conn)
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock_conn(&conn)?;
            f(&guard)
        })
        .await
        .map_err(|e| WeatherError::StoreUnavailable(format!("log store task failed: {e}")))?
    }

    fn table_exists(conn: &Connection) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'weather_logs'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn append(&self, record: &LogRecord) -> Result<()> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO weather_logs (partition_key, row_key, timestamp_ms, status, status_code, payload_locator, etag)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.partition_key,
                    record.row_key,
                    record.timestamp.timestamp_millis(),
                    record.status.as_str(),
                    record.status_code.map(i64::from),
                    record.payload_locator,
                    fresh_etag(),
                ],
            )?;
            if inserted == 0 {
                debug!(row_key = %record.row_key, "duplicate row key ignored");
            }
            Ok(())
        })
        .await
    }

    async fn query_range(
        &self,
        partition_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LogEntity>> {
        let partition_key = partition_key.to_string();
        self.with_conn(move |conn| {
            if !Self::table_exists(conn)? {
                return Err(WeatherError::not_found("Weather logs table not found."));
            }
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM weather_logs
                 WHERE partition_key = ?1 AND timestamp_ms >= ?2 AND timestamp_ms <= ?3
                 ORDER BY timestamp_ms ASC, row_key ASC"
            ))?;
            let rows = stmt
                .query_map(
                    params![partition_key, from.timestamp_millis(), to.timestamp_millis()],
                    RawRow::from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawRow::into_entity).collect()
        })
        .await
    }

    async fn get_by_key(&self, partition_key: &str, row_key: &str) -> Result<LogEntity> {
        let partition_key = partition_key.to_string();
        let row_key = row_key.to_string();
        self.with_conn(move |conn| {
            let not_found =
                || WeatherError::not_found(format!("No weather log found with RowKey: {}", row_key));
            if !Self::table_exists(conn)? {
                return Err(not_found());
            }
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM weather_logs WHERE partition_key = ?1 AND row_key = ?2"),
                params![partition_key, row_key],
                RawRow::from_row,
            )
            .optional()?
            .ok_or_else(not_found)?
            .into_entity()
        })
        .await
    }
}
