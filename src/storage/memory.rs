//! In-memory storage backend for testing.

use crate::error::{Result, StorageError};
use crate::storage::traits::SessionBackend;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory storage backend.
///
/// Sessions live as long as the backend does. Useful for tests and for
/// single-process deployments that can afford to lose sessions on restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .map_or(0, |sessions| sessions.len())
    }

    /// Whether no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Backend("session map lock poisoned".to_string())
}

impl SessionBackend for MemoryBackend {
    fn put(&self, id: &str, payload: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(id.to_string(), payload.to_string());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<String>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(id);
        Ok(())
    }
}
