//! SQLite-backed key-value store for workspace state.
//!
//! Each key holds a JSON document and the millisecond timestamp of its last
//! write. The maximum timestamp across all keys is the store watermark that
//! change detection polls.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, trace};

use super::entry::{StateDump, StateEntry, StateKey};
use crate::error::{CldError, Result};

/// SQLite schema for the state table.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable store of named JSON values with a monotonic watermark.
///
/// All access goes through one connection behind a mutex, so every
/// operation (a full read, or a single/multi-key write) is serialized.
pub struct StateStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl StateStore {
    /// Opens or creates a store at the given path.
    ///
    /// Missing keys are seeded with empty defaults so the watermark is
    /// always defined.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CldError::Startup(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        debug!(path = %path.display(), "Opening state database");
        let conn = Connection::open(path)
            .map_err(|e| CldError::Database(format!("Failed to open database: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "State store ready");
        Ok(store)
    }

    /// Creates an in-memory store with no backing file.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CldError::Database(format!("Failed to create in-memory database: {e}"))
        })?;
        Self::init(conn, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| CldError::Database(format!("Failed to initialize schema: {e}")))?;

        let tx = conn.transaction()?;
        let seeded = seed_missing_keys(&tx)?;
        tx.commit()?;
        if seeded > 0 {
            debug!(seeded, "Seeded default state");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CldError::Database("state store lock poisoned".to_string()))
    }

    /// Path of the backing database file, if any.
    pub fn backing_file(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the most recently committed value for `key`.
    #[instrument(skip(self))]
    pub fn get(&self, key: StateKey) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM state WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|text| parse_value(key.as_str(), &text)).transpose()
    }

    /// Returns the value for `key` decoded as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: StateKey) -> Result<Option<T>> {
        self.get(key)?
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    CldError::Serialization(format!("Malformed value for '{key}': {e}"))
                })
            })
            .transpose()
    }

    /// Returns every key's value plus the watermark, read in one statement.
    #[instrument(skip(self))]
    pub fn get_all(&self) -> Result<StateDump> {
        let entries = self.entries()?;
        let watermark = entries.iter().map(|e| e.updated_at).max().unwrap_or(0);
        let values: BTreeMap<String, Value> =
            entries.into_iter().map(|e| (e.key, e.value)).collect();
        trace!(keys = values.len(), watermark, "Read all state");
        Ok(StateDump { values, watermark })
    }

    /// Returns all rows with their individual timestamps.
    pub fn entries(&self) -> Result<Vec<StateEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM state ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, text, updated_at)| {
                let value = parse_value(&key, &text)?;
                Ok(StateEntry {
                    key,
                    value,
                    updated_at,
                })
            })
            .collect()
    }

    /// Writes one key, replacing any prior value.
    ///
    /// Always advances the watermark, even when the content is unchanged.
    pub fn set<T: Serialize>(&self, key: StateKey, value: &T) -> Result<i64> {
        let value = serde_json::to_value(value)?;
        self.set_many(&[(key, value)])
    }

    /// Writes several keys as one all-or-nothing transaction.
    ///
    /// Every key in the batch receives the same timestamp, which becomes the
    /// new watermark and is returned.
    #[instrument(skip_all, fields(keys = entries.len()))]
    pub fn set_many(&self, entries: &[(StateKey, Value)]) -> Result<i64> {
        let serialized = entries
            .iter()
            .map(|(key, value)| Ok((*key, serde_json::to_string(value)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let stamp = next_stamp(&tx)?;
        for (key, text) in &serialized {
            tx.execute(
                "INSERT OR REPLACE INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key.as_str(), text, stamp],
            )?;
        }
        tx.commit()?;

        debug!(stamp, "State written");
        Ok(stamp)
    }

    /// Read-modify-write of a single key inside one transaction.
    ///
    /// A missing key starts from `T::default()`. The closure's return value
    /// is passed through.
    pub fn update<T, R, F>(&self, key: StateKey, f: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> R,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let raw: Option<String> = tx
            .query_row(
                "SELECT value FROM state WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let mut current: T = match raw {
            Some(text) => serde_json::from_str(&text).map_err(|e| {
                CldError::Serialization(format!("Malformed value for '{key}': {e}"))
            })?,
            None => T::default(),
        };

        let out = f(&mut current);

        let text = serde_json::to_string(&current)?;
        let stamp = next_stamp(&tx)?;
        tx.execute(
            "INSERT OR REPLACE INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), text, stamp],
        )?;
        tx.commit()?;

        trace!(%key, stamp, "State updated");
        Ok(out)
    }

    /// Returns the watermark: the maximum `updated_at` across all keys.
    pub fn last_modified(&self) -> Result<i64> {
        let conn = self.lock()?;
        let watermark: Option<i64> =
            conn.query_row("SELECT MAX(updated_at) FROM state", [], |row| row.get(0))?;
        watermark.ok_or(CldError::StoreEmpty)
    }

    /// Replaces every entry with the contents of another state database.
    ///
    /// Source timestamps are preserved. The swap runs in one transaction;
    /// on any failure the store keeps its pre-import contents. Returns the
    /// number of rows copied.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub fn import_from(&self, source: &Path) -> Result<usize> {
        let import_err = |reason: String| CldError::ImportSource {
            path: source.display().to_string(),
            reason,
        };

        if !source.is_file() {
            return Err(import_err("source database not found".to_string()));
        }

        let rows = {
            let src = Connection::open_with_flags(source, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .map_err(|e| import_err(format!("failed to open source database: {e}")))?;

            let has_table: bool = src
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'state')",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| import_err(format!("failed to read source database: {e}")))?;
            if !has_table {
                return Err(import_err("missing required \"state\" table".to_string()));
            }

            let mut stmt = src
                .prepare("SELECT key, value, updated_at FROM state")
                .map_err(|e| import_err(format!("failed to query source state: {e}")))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| import_err(format!("failed to scan source row: {e}")))?;
            rows
        };

        for (key, text, _) in &rows {
            if serde_json::from_str::<Value>(text).is_err() {
                return Err(import_err(format!("malformed value for key '{key}'")));
            }
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM state", [])?;
        for (key, text, updated_at) in &rows {
            tx.execute(
                "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, text, updated_at],
            )?;
        }
        let seeded = seed_missing_keys(&tx)?;
        tx.commit()?;

        info!(rows = rows.len(), seeded, "State imported");
        Ok(rows.len())
    }

    /// Reads the raw bytes of the backing file.
    ///
    /// The store lock is held for the duration of the read so no write can
    /// interleave with the copy.
    pub fn read_backing_file(&self) -> Result<Vec<u8>> {
        let path = self.path.as_deref().ok_or_else(|| {
            CldError::Other("in-memory state store has no backing file".to_string())
        })?;
        let _conn = self.lock()?;
        Ok(std::fs::read(path)?)
    }
}

/// Next write timestamp: wall-clock milliseconds, bumped past the current
/// watermark so that every write advances it.
fn next_stamp(conn: &Connection) -> Result<i64> {
    let current: Option<i64> =
        conn.query_row("SELECT MAX(updated_at) FROM state", [], |row| row.get(0))?;
    let now = Utc::now().timestamp_millis();
    Ok(current.map_or(now, |watermark| now.max(watermark + 1)))
}

fn seed_missing_keys(conn: &Connection) -> Result<usize> {
    let stamp = next_stamp(conn)?;
    let mut seeded = 0;
    for key in StateKey::ALL {
        let text = serde_json::to_string(&key.default_value())?;
        seeded += conn.execute(
            "INSERT OR IGNORE INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), text, stamp],
        )?;
    }
    Ok(seeded)
}

fn parse_value(key: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| CldError::Serialization(format!("Malformed value for '{key}': {e}")))
}
