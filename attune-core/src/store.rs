//! SQLite container for save payloads.
//!
//! The binary payload produced by [`crate::persistence`] lands in a
//! one-table save-slot store:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS save_slots (
//!     slot       TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! WAL mode keeps reads cheap while a save is in flight; the optional
//! CRC-32 column catches corrupted blobs on load.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::Result;

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// Basic CRC-32 (ISO 3309 / ITU-T V.42) computation.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// SaveStore
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS save_slots (
    slot       TEXT PRIMARY KEY,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

/// Handle to an open SQLite database holding save slots.
pub struct SaveStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SaveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SaveStore {
    /// Open (or create) the store at `path`. The schema is created if
    /// missing; WAL mode is enabled when `config.wal_mode` is true.
    ///
    /// # Errors
    /// Returns [`crate::AttuneError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = config.wal_mode, "save store opened");
        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory store (tests).
    ///
    /// # Errors
    /// Returns [`crate::AttuneError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Write (upsert) a slot's payload.
    ///
    /// # Errors
    /// Returns [`crate::AttuneError::Database`] on SQLite failures.
    pub fn put(&self, slot: &str, data: &[u8]) -> Result<()> {
        let start = Instant::now();
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(data));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO save_slots (slot, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slot) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![slot, data, now, checksum],
        )?;

        debug!(
            slot,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "slot written"
        );
        Ok(())
    }

    /// Read a slot's payload. Returns `None` for missing slots. A checksum
    /// mismatch logs a warning; the data is still returned so the caller's
    /// record-level recovery can keep what it can.
    ///
    /// # Errors
    /// Returns [`crate::AttuneError::Database`] on SQLite failures.
    pub fn get(&self, slot: &str) -> Result<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM save_slots WHERE slot = ?1")?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![slot], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(ref expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if *expected != actual {
                    warn!(slot, %expected, %actual, "checksum mismatch, save may be corrupt");
                }
            }
        }
        Ok(Some(data))
    }

    /// Delete a slot. Returns `true` if a row was removed.
    ///
    /// # Errors
    /// Returns [`crate::AttuneError::Database`] on SQLite failures.
    pub fn delete(&self, slot: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM save_slots WHERE slot = ?1", params![slot])?;
        Ok(deleted > 0)
    }

    /// All slot names, sorted.
    ///
    /// # Errors
    /// Returns [`crate::AttuneError::Database`] on SQLite failures.
    pub fn list_slots(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT slot FROM save_slots ORDER BY slot")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    /// Copy the whole database to `dest_path` using SQLite's online-backup
    /// API. Safe to call while the store is in use.
    ///
    /// # Errors
    /// Returns [`crate::AttuneError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "store backup completed"
        );
        Ok(())
    }

    /// Path of the database file, or `:memory:`.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Extension trait that adds an `.optional()` combinator to `rusqlite::Result`.
trait OptionalExt<T> {
    /// Convert `QueryReturnedNoRows` into `Ok(None)`.
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
