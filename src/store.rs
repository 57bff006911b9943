use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::app_dirs::AppDirs;

pub const KEY_CHECKED_IN: &str = "checkedIn";
pub const KEY_STATUS_MESSAGE: &str = "statusMessage";
pub const KEY_CHECK_IN_TIMESTAMP: &str = "checkInTimestamp";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data in store: {0}")]
    InvalidData(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),
}

/// Durable attendance state. `check_in_timestamp` is set exactly while checked in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceState {
    pub checked_in: bool,
    pub status_message: String,
    pub check_in_timestamp: Option<DateTime<Utc>>,
}

impl AttendanceState {
    pub fn checked_in_at(at: DateTime<Utc>, status_message: impl Into<String>) -> Self {
        Self {
            checked_in: true,
            status_message: status_message.into(),
            check_in_timestamp: Some(at),
        }
    }
}

pub trait StateStore {
    /// Returns the default state when nothing has been persisted
    fn load(&self) -> Result<AttendanceState, StoreError>;
    /// Must not return until the write is durable (or has failed)
    fn save(&self, state: &AttendanceState) -> Result<(), StoreError>;
}

/// Key-value table in SQLite holding the three attendance keys
#[derive(Debug)]
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Open the store under the default state directory
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("geoattend_state.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS attendance_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM attendance_kv WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl StateStore for SqliteStateStore {
    fn load(&self) -> Result<AttendanceState, StoreError> {
        let checked_in = self.get(KEY_CHECKED_IN)?.as_deref() == Some("true");
        let status_message = self.get(KEY_STATUS_MESSAGE)?.unwrap_or_default();

        let check_in_timestamp = match self.get(KEY_CHECK_IN_TIMESTAMP)? {
            Some(raw) if checked_in => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::InvalidData(format!("{KEY_CHECK_IN_TIMESTAMP}: {e}")))?
                    .with_timezone(&Utc),
            ),
            Some(_) => {
                warn!("ignoring check-in timestamp persisted while checked out");
                None
            }
            None => None,
        };

        Ok(AttendanceState {
            checked_in,
            status_message,
            check_in_timestamp,
        })
    }

    fn save(&self, state: &AttendanceState) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let upsert = "INSERT INTO attendance_kv (key, value) VALUES (?1, ?2)
                      ON CONFLICT(key) DO UPDATE SET value = excluded.value";
        tx.execute(upsert, params![KEY_CHECKED_IN, state.checked_in.to_string()])?;
        tx.execute(upsert, params![KEY_STATUS_MESSAGE, state.status_message])?;
        match state.check_in_timestamp {
            Some(ts) => {
                tx.execute(upsert, params![KEY_CHECK_IN_TIMESTAMP, ts.to_rfc3339()])?;
            }
            None => {
                tx.execute(
                    "DELETE FROM attendance_kv WHERE key = ?1",
                    [KEY_CHECK_IN_TIMESTAMP],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// In-process store; can be told to reject writes
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RefCell<AttendanceState>,
    saves: Cell<usize>,
    fail_writes: Cell<bool>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AttendanceState) -> Self {
        Self {
            state: RefCell::new(state),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn snapshot(&self) -> AttendanceState {
        self.state.borrow().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<AttendanceState, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &AttendanceState) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::WriteRejected("store is read-only".into()));
        }
        *self.state.borrow_mut() = state.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    #[test]
    fn empty_store_loads_default_state() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        let state = store.load().unwrap();
        assert_eq!(state, AttendanceState::default());
        assert!(!state.checked_in);
        assert!(state.status_message.is_empty());
    }

    #[test]
    fn checked_in_state_roundtrips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let state = AttendanceState::checked_in_at(t(9, 0), "You Checked In at 2:30:00 PM");

        {
            let store = SqliteStateStore::open(&path).unwrap();
            store.save(&state).unwrap();
        }

        let reopened = SqliteStateStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), state);
    }

    #[test]
    fn check_out_clears_timestamp_key() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store
            .save(&AttendanceState::checked_in_at(t(9, 0), "in"))
            .unwrap();
        store
            .save(&AttendanceState {
                checked_in: false,
                status_message: "out".into(),
                check_in_timestamp: None,
            })
            .unwrap();

        assert_eq!(store.get(KEY_CHECK_IN_TIMESTAMP).unwrap(), None);
        assert_eq!(store.get(KEY_CHECKED_IN).unwrap().as_deref(), Some("false"));
        let loaded = store.load().unwrap();
        assert!(!loaded.checked_in);
        assert_eq!(loaded.status_message, "out");
        assert_eq!(loaded.check_in_timestamp, None);
    }

    #[test]
    fn stray_timestamp_while_checked_out_is_ignored() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO attendance_kv (key, value) VALUES (?1, ?2)",
                params![KEY_CHECK_IN_TIMESTAMP, t(9, 0).to_rfc3339()],
            )
            .unwrap();
        assert_eq!(store.load().unwrap().check_in_timestamp, None);
    }

    #[test]
    fn unparsable_timestamp_is_invalid_data() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        for (k, v) in [(KEY_CHECKED_IN, "true"), (KEY_CHECK_IN_TIMESTAMP, "yesterday")] {
            store
                .conn
                .execute(
                    "INSERT INTO attendance_kv (key, value) VALUES (?1, ?2)",
                    params![k, v],
                )
                .unwrap();
        }
        assert!(matches!(store.load(), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn memory_store_counts_and_rejects_writes() {
        let store = MemoryStateStore::new();
        let state = AttendanceState::checked_in_at(t(8, 15), "in");
        store.save(&state).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap(), state);

        store.set_fail_writes(true);
        assert!(matches!(
            store.save(&AttendanceState::default()),
            Err(StoreError::WriteRejected(_))
        ));
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot(), state);
    }
}
