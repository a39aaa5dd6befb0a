//! SQLite-backed persistence gateway.
//!
//! One connection guarded by a mutex; every statement runs on tokio's
//! blocking pool so a slow disk stalls only the calling loop.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use plunge_core::gateways::PersistenceGateway;
use plunge_core::models::{LeakRecord, OzoneEntry, TemperatureSample};
use plunge_core::{PlungeError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS temperature_samples (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        room_temp_f   REAL,
        water_temp_f  REAL,
        timestamp     TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS ozone_entries (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time        TEXT NOT NULL,
        end_time          TEXT,
        duration_minutes  INTEGER NOT NULL,
        running           INTEGER NOT NULL,
        status_message    TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS leak_records (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        detected_at  TEXT NOT NULL,
        cleared_at   TEXT
    );
";

const OZONE_COLUMNS: &str =
    "id, start_time, end_time, duration_minutes, running, status_message";

fn storage(err: rusqlite::Error) -> PlungeError {
    PlungeError::Storage(err.to_string())
}

fn ozone_from_row(row: &Row<'_>) -> rusqlite::Result<OzoneEntry> {
    Ok(OzoneEntry {
        id: row.get(0)?,
        start_time: row.get(1)?,
        end_time: row.get(2)?,
        duration_minutes: row.get(3)?,
        running: row.get(4)?,
        status_message: row.get(5)?,
    })
}

fn leak_from_row(row: &Row<'_>) -> rusqlite::Result<LeakRecord> {
    Ok(LeakRecord {
        id: row.get(0)?,
        detected_at: row.get(1)?,
        cleared_at: row.get(2)?,
    })
}

fn select_ozone(conn: &Connection, id: i64) -> rusqlite::Result<Option<OzoneEntry>> {
    conn.query_row(
        &format!("SELECT {OZONE_COLUMNS} FROM ozone_entries WHERE id = ?1"),
        params![id],
        ozone_from_row,
    )
    .optional()
}

// ── SqliteStore ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(storage)?;
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::warn!(error = %e, "failed to enable WAL mode");
        }
        let store = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(store)
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(storage)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `task` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            task(&*guard)
        })
        .await
        .map_err(|e| PlungeError::Storage(format!("database task failed: {e}")))?
        .map_err(storage)
    }
}

impl PersistenceGateway for SqliteStore {
    async fn save_temperature_sample(
        &self,
        room_temp_f: Option<f64>,
        water_temp_f: Option<f64>,
    ) -> Result<TemperatureSample> {
        let timestamp = Utc::now();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO temperature_samples (room_temp_f, water_temp_f, timestamp)
                 VALUES (?1, ?2, ?3)",
                params![room_temp_f, water_temp_f, timestamp],
            )?;
            Ok(TemperatureSample {
                id: conn.last_insert_rowid(),
                room_temp_f,
                water_temp_f,
                timestamp,
            })
        })
        .await
    }

    async fn get_latest_ozone_entry(&self) -> Result<Option<OzoneEntry>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {OZONE_COLUMNS} FROM ozone_entries ORDER BY id DESC LIMIT 1"),
                [],
                ozone_from_row,
            )
            .optional()
        })
        .await
    }

    async fn start_ozone_entry(
        &self,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<OzoneEntry> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO ozone_entries (start_time, duration_minutes, running, status_message)
                 VALUES (?1, ?2, 1, 'Running')",
                params![start_time, duration_minutes],
            )?;
            Ok(OzoneEntry {
                id: conn.last_insert_rowid(),
                start_time,
                end_time: None,
                duration_minutes,
                running: true,
                status_message: "Running".to_string(),
            })
        })
        .await
    }

    async fn stop_ozone_entry(&self, id: i64) -> Result<OzoneEntry> {
        let end_time = Utc::now();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE ozone_entries SET end_time = ?1, running = 0 WHERE id = ?2",
                params![end_time, id],
            )?;
            select_ozone(conn, id)
        })
        .await?
        .ok_or_else(|| PlungeError::NotFound(format!("ozone entry {id}")))
    }

    async fn update_ozone_entry_status(&self, id: i64, status: &str) -> Result<OzoneEntry> {
        let status = status.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE ozone_entries SET status_message = ?1 WHERE id = ?2",
                params![status, id],
            )?;
            select_ozone(conn, id)
        })
        .await?
        .ok_or_else(|| PlungeError::NotFound(format!("ozone entry {id}")))
    }

    async fn get_latest_leak_record(&self) -> Result<Option<LeakRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, detected_at, cleared_at FROM leak_records ORDER BY id DESC LIMIT 1",
                [],
                leak_from_row,
            )
            .optional()
        })
        .await
    }

    async fn create_leak_record(&self, detected_at: DateTime<Utc>) -> Result<LeakRecord> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO leak_records (detected_at) VALUES (?1)",
                params![detected_at],
            )?;
            Ok(LeakRecord {
                id: conn.last_insert_rowid(),
                detected_at,
                cleared_at: None,
            })
        })
        .await
    }

    async fn clear_leak_record(&self, id: i64) -> Result<LeakRecord> {
        let cleared_at = Utc::now();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE leak_records SET cleared_at = ?1 WHERE id = ?2",
                params![cleared_at, id],
            )?;
            conn.query_row(
                "SELECT id, detected_at, cleared_at FROM leak_records WHERE id = ?1",
                params![id],
                leak_from_row,
            )
            .optional()
        })
        .await?
        .ok_or_else(|| PlungeError::NotFound(format!("leak record {id}")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
