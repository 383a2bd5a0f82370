//! Durable string-keyed slots for persisted state.
//!
//! The watchlist only needs "read the value under a key" and "replace the
//! value under a key". Each backend serializes a whole value per call; there
//! is no cross-process locking, so concurrent writers are last-writer-wins.

use crate::error::SlotError;
use postgres::{Client, NoTls};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A durable key-value slot.
pub trait KvSlot {
    /// Returns `Ok(None)` when nothing has been stored under `key` yet.
    fn read(&self, key: &str) -> Result<Option<String>, SlotError>;

    /// Replaces the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), SlotError>;
}

// ---------------------------------------------------------------------------
// In-memory slot
// ---------------------------------------------------------------------------

/// Non-durable slot for tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        let values = self
            .values
            .lock()
            .map_err(|_| SlotError::Unavailable("memory slot lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| SlotError::Unavailable("memory slot lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File slot
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSlot { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl KvSlot for FileSlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Postgres slot
// ---------------------------------------------------------------------------

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS kv_slots (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
";

/// Slot backed by a `kv_slots` table, for deployments that share state
/// between hosts.
pub struct PostgresSlot {
    client: Mutex<Client>,
}

impl PostgresSlot {
    /// Connects and makes sure the table exists.
    pub fn connect(database_url: &str) -> Result<Self, SlotError> {
        let mut client = Client::connect(database_url, NoTls)?;
        client.batch_execute(CREATE_TABLE)?;
        Ok(PostgresSlot {
            client: Mutex::new(client),
        })
    }

    fn client(&self) -> Result<std::sync::MutexGuard<'_, Client>, SlotError> {
        self.client
            .lock()
            .map_err(|_| SlotError::Unavailable("postgres slot lock poisoned".to_string()))
    }
}

impl KvSlot for PostgresSlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        let mut client = self.client()?;
        let row = client.query_opt("SELECT value FROM kv_slots WHERE key = $1", &[&key])?;
        Ok(row.map(|r| r.get(0)))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        let mut client = self.client()?;
        client.execute(
            "INSERT INTO kv_slots (key, value, updated_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
            &[&key, &value, &chrono::Utc::now()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_slot_round_trip() {
        let slot = MemorySlot::new();
        assert_eq!(slot.read("k").expect("read"), None);
        slot.write("k", "v1").expect("write");
        slot.write("k", "v2").expect("write");
        assert_eq!(slot.read("k").expect("read").as_deref(), Some("v2"));
    }

    #[test]
    fn test_file_slot_missing_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let slot = FileSlot::new(dir.path().join("state"));
        assert_eq!(slot.read("charger_watchlist").expect("read"), None);
    }

    #[test]
    fn test_file_slot_creates_directory_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let slot = FileSlot::new(dir.path().join("nested").join("state"));
        slot.write("charger_watchlist", "{\"a\":1}").expect("first write");
        slot.write("charger_watchlist", "{\"a\":2}").expect("second write");
        assert_eq!(
            slot.read("charger_watchlist").expect("read").as_deref(),
            Some("{\"a\":2}")
        );
        assert!(!slot.dir().join("charger_watchlist.json.tmp").exists());
    }

    #[test]
    fn test_file_slot_sanitizes_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let slot = FileSlot::new(dir.path());
        slot.write("../escape", "x").expect("write");
        assert!(dir.path().join("___escape.json").exists());
    }
}
