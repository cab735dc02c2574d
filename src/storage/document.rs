//! Document backend on MongoDB (synchronous driver).
//!
//! One document per session: `{ session_id, value }`. Writes are explicit
//! upserts filtered on `session_id`, and a unique index on that field is
//! declared at open so two documents can never share an identifier.
//!
//! Deadlines: connecting and server selection use the configured timeout, and
//! reads carry it as the server-side `maxTimeMS`. The synchronous driver has
//! no socket timeout, so a write to a server that stops answering after the
//! connection is established is bounded only by the operating system.

use crate::error::{Error, Result, StorageError};
use crate::storage::traits::SessionBackend;
use mongodb::IndexModel;
use mongodb::bson::{Document, doc};
use mongodb::error::ErrorKind;
use mongodb::options::{FindOneOptions, IndexOptions, UpdateOptions};
use mongodb::sync::{Client, Collection};
use std::time::Duration;
use tracing::debug;

const VALUE_FIELD: &str = "value";

/// Tuning knobs for the MongoDB backend.
#[derive(Debug, Clone)]
pub struct MongoOptions {
    /// Database holding the session collection.
    pub database: String,

    /// Session collection.
    pub collection: String,

    /// Connect and server-selection timeout, unless the URI sets its own.
    pub timeout: Duration,
}

impl Default for MongoOptions {
    fn default() -> Self {
        Self {
            database: "sessions".to_string(),
            collection: "store".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Session storage in a MongoDB collection.
pub struct MongoBackend {
    collection: Collection<Document>,
    timeout: Duration,
}

impl std::fmt::Debug for MongoBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoBackend")
            .field("collection", &self.collection.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MongoBackend {
    /// Connect with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the server is unreachable or the index
    /// cannot be created.
    pub fn connect(uri: &str) -> Result<Self> {
        Self::connect_with(uri, &MongoOptions::default())
    }

    /// Connect with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the server is unreachable or the index
    /// cannot be created.
    pub fn connect_with(uri: &str, options: &MongoOptions) -> Result<Self> {
        let uri = with_timeouts(uri, options.timeout);
        let client = Client::with_uri_str(&uri)
            .map_err(|e| Error::Config(format!("cannot connect to MongoDB: {e}")))?;
        let collection = client
            .database(&options.database)
            .collection::<Document>(&options.collection);

        let index = IndexModel::builder()
            .keys(doc! { "session_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection
            .create_index(index, None)
            .map_err(|e| Error::Config(format!("cannot create session index: {e}")))?;

        debug!(
            database = %options.database,
            collection = %options.collection,
            "connected MongoDB session store"
        );
        Ok(Self {
            collection,
            timeout: options.timeout,
        })
    }
}

/// Add connect and server-selection timeouts to a connection string unless
/// it already carries them.
fn with_timeouts(uri: &str, timeout: Duration) -> String {
    let millis = timeout.as_millis();
    let mut uri = uri.to_string();
    for key in ["connectTimeoutMS", "serverSelectionTimeoutMS"] {
        if uri.to_ascii_lowercase().contains(&key.to_ascii_lowercase()) {
            continue;
        }
        let rest = uri.split_once("://").map_or(uri.as_str(), |(_, rest)| rest);
        let separator = if rest.contains('?') {
            "&"
        } else if rest.contains('/') {
            "?"
        } else {
            "/?"
        };
        uri = format!("{uri}{separator}{key}={millis}");
    }
    uri
}

/// Server error code for an operation that exceeded its `maxTimeMS`.
const MAX_TIME_MS_EXPIRED: i32 = 50;

fn find_options(timeout: Duration) -> FindOneOptions {
    FindOneOptions::builder().max_time(timeout).build()
}

fn storage_error(err: &mongodb::error::Error) -> Error {
    let storage = match err.kind.as_ref() {
        ErrorKind::Command(command) if command.code == MAX_TIME_MS_EXPIRED => StorageError::Timeout,
        ErrorKind::ServerSelection { .. } => StorageError::Timeout,
        ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => StorageError::Timeout,
        ErrorKind::Io(_) => StorageError::Connection(err.to_string()),
        _ => StorageError::Backend(err.to_string()),
    };
    storage.into()
}

impl SessionBackend for MongoBackend {
    fn put(&self, id: &str, payload: &str) -> Result<()> {
        self.collection
            .update_one(
                doc! { "session_id": id },
                doc! { "$set": { "session_id": id, "value": payload } },
                UpdateOptions::builder().upsert(true).build(),
            )
            .map_err(|e| storage_error(&e))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<String>> {
        let found = self
            .collection
            .find_one(doc! { "session_id": id }, find_options(self.timeout))
            .map_err(|e| storage_error(&e))?;
        let Some(document) = found else {
            return Ok(None);
        };
        document
            .get_str(VALUE_FIELD)
            .map(|value| Some(value.to_string()))
            .map_err(|e| StorageError::Corrupt(e.to_string()).into())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.collection
            .delete_one(doc! { "session_id": id }, None)
            .map_err(|e| storage_error(&e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_added_to_bare_host() {
        let uri = with_timeouts("mongodb://localhost:27017", Duration::from_secs(5));
        assert_eq!(
            uri,
            "mongodb://localhost:27017/?connectTimeoutMS=5000&serverSelectionTimeoutMS=5000"
        );
    }

    #[test]
    fn timeouts_added_after_database_path() {
        let uri = with_timeouts("mongodb://localhost/app", Duration::from_millis(1500));
        assert_eq!(
            uri,
            "mongodb://localhost/app?connectTimeoutMS=1500&serverSelectionTimeoutMS=1500"
        );
    }

    #[test]
    fn timeouts_appended_to_existing_query() {
        let uri = with_timeouts("mongodb://localhost/?authSource=admin", Duration::from_secs(2));
        assert!(uri.starts_with("mongodb://localhost/?authSource=admin&connectTimeoutMS=2000"));
    }

    #[test]
    fn explicit_timeouts_are_kept() {
        let original = "mongodb://localhost/?connectTimeoutMS=100&serverSelectionTimeoutMS=200";
        assert_eq!(with_timeouts(original, Duration::from_secs(5)), original);
    }

    #[test]
    fn reads_carry_server_deadline() {
        let options = find_options(Duration::from_millis(750));
        assert_eq!(options.max_time, Some(Duration::from_millis(750)));
    }

    #[test]
    fn default_options() {
        let options = MongoOptions::default();
        assert_eq!(options.database, "sessions");
        assert_eq!(options.collection, "store");
        assert_eq!(options.timeout, Duration::from_secs(5));
    }

    fn live_backend() -> Option<MongoBackend> {
        let uri = std::env::var("SESSIONSTORE_TEST_MONGO_URI").ok()?;
        let options = MongoOptions {
            database: "sessionstore_test".to_string(),
            ..MongoOptions::default()
        };
        Some(MongoBackend::connect_with(&uri, &options).unwrap())
    }

    #[test]
    #[ignore = "requires SESSIONSTORE_TEST_MONGO_URI"]
    fn live_put_get_delete() {
        let Some(store) = live_backend() else {
            return;
        };
        let id = crate::identifier::generate_identifier();

        assert!(store.get(&id).unwrap().is_none());
        store.put(&id, "first").unwrap();
        store.put(&id, "second").unwrap();
        assert_eq!(store.get(&id).unwrap().as_deref(), Some("second"));

        store.delete(&id).unwrap();
        store.delete(&id).unwrap();
        assert!(store.get(&id).unwrap().is_none());
    }
}
