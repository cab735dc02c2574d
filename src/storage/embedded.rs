//! Embedded key-value backend on redb.
//!
//! All sessions share one table. Keys are `session_<id>` so other key
//! families can live in the same database without colliding.

use crate::error::{Error, Result, StorageError};
use crate::storage::traits::SessionBackend;
use redb::{Builder, Database, ReadableTable, TableDefinition};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SESSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sessions");

/// Database file created inside the configured directory.
pub const DB_FILE: &str = "sessions.redb";

/// Prefix for every session key.
pub const KEY_PREFIX: &str = "session_";

/// Tuning knobs for the redb backend.
#[derive(Debug, Clone, Default)]
pub struct RedbOptions {
    /// Page cache size in bytes. `None` keeps redb's default.
    pub cache_size: Option<usize>,
}

/// Session storage in an embedded redb database.
#[derive(Debug)]
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl RedbBackend {
    /// Open (or create) the database in `dir` with default options.
    ///
    /// An empty path selects `<tmp>/sessionstore`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the directory or database cannot be opened.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(dir, &RedbOptions::default())
    }

    /// Open (or create) the database in `dir` with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the directory or database cannot be opened.
    pub fn open_with(dir: impl AsRef<Path>, options: &RedbOptions) -> Result<Self> {
        let dir = dir.as_ref();
        let dir = if dir.as_os_str().is_empty() {
            default_dir()
        } else {
            dir.to_path_buf()
        };
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Config(format!("cannot create {}: {e}", dir.display())))?;

        let path = dir.join(DB_FILE);
        let mut builder = Builder::new();
        if let Some(bytes) = options.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = builder
            .create(&path)
            .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
        ensure_table(&db).map_err(|e| Error::Config(e.to_string()))?;

        debug!(path = %path.display(), "opened redb session store");
        Ok(Self { db, path })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, key: &[u8], payload: Option<&[u8]>) -> std::result::Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SESSIONS)?;
            match payload {
                Some(value) => {
                    table.insert(key, value)?;
                }
                None => {
                    table.remove(key)?;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn read(&self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, redb::Error> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SESSIONS)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }
}

/// Storage key for a session identifier.
#[must_use]
pub fn session_key(id: &str) -> Vec<u8> {
    format!("{KEY_PREFIX}{id}").into_bytes()
}

fn default_dir() -> PathBuf {
    std::env::temp_dir().join("sessionstore")
}

fn ensure_table(db: &Database) -> std::result::Result<(), redb::Error> {
    let txn = db.begin_write()?;
    txn.open_table(SESSIONS)?;
    txn.commit()?;
    Ok(())
}

fn backend_error(err: redb::Error) -> Error {
    StorageError::Backend(err.to_string()).into()
}

impl SessionBackend for RedbBackend {
    fn put(&self, id: &str, payload: &str) -> Result<()> {
        self.write(&session_key(id), Some(payload.as_bytes()))
            .map_err(backend_error)
    }

    fn get(&self, id: &str) -> Result<Option<String>> {
        let Some(bytes) = self.read(&session_key(id)).map_err(backend_error)? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(e.to_string()).into())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.write(&session_key(id), None).map_err(backend_error)
    }
}
