//! Storage trait definitions.

use crate::error::Result;
use std::sync::Arc;

/// Persistence for encoded session payloads, keyed by session identifier.
///
/// Payloads are opaque to the backend: they are already authenticated (and
/// possibly encrypted) by the codec layer.
pub trait SessionBackend: Send + Sync {
    /// Insert or replace the payload stored for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put(&self, id: &str, payload: &str) -> Result<()>;

    /// Get the payload stored for `id`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, id: &str) -> Result<Option<String>>;

    /// Delete the payload stored for `id`.
    ///
    /// Deleting an identifier that was never stored is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn delete(&self, id: &str) -> Result<()>;
}

impl<T: SessionBackend + ?Sized> SessionBackend for Box<T> {
    fn put(&self, id: &str, payload: &str) -> Result<()> {
        (**self).put(id, payload)
    }

    fn get(&self, id: &str) -> Result<Option<String>> {
        (**self).get(id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
}

impl<T: SessionBackend + ?Sized> SessionBackend for Arc<T> {
    fn put(&self, id: &str, payload: &str) -> Result<()> {
        (**self).put(id, payload)
    }

    fn get(&self, id: &str) -> Result<Option<String>> {
        (**self).get(id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
}
