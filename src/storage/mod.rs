//! Storage backends for session payloads.

#[cfg(feature = "mongo-backend")]
pub mod document;
#[cfg(feature = "redb-backend")]
pub mod embedded;
#[cfg(feature = "dgraph-backend")]
pub mod graph;
pub mod memory;
pub mod traits;

#[cfg(feature = "mongo-backend")]
pub use document::{MongoBackend, MongoOptions};
#[cfg(feature = "redb-backend")]
pub use embedded::{RedbBackend, RedbOptions};
#[cfg(feature = "dgraph-backend")]
pub use graph::{DgraphBackend, DgraphOptions};
pub use memory::MemoryBackend;
pub use traits::SessionBackend;

use crate::config::{BackendKind, StorageConfig};
use crate::error::Result;

/// Open the backend named in `config`.
///
/// # Errors
///
/// Returns [`Error::Config`](crate::Error::Config) if the backend cannot be opened, or was not
/// compiled into this build.
pub fn open_backend(config: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    match config.backend {
        BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendKind::Redb => open_redb(config),
        BackendKind::Mongo => open_mongo(config),
        BackendKind::Dgraph => open_dgraph(config),
    }
}

#[cfg(feature = "redb-backend")]
fn open_redb(config: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    let options = RedbOptions {
        cache_size: config.cache_size,
    };
    Ok(Box::new(RedbBackend::open_with(&config.path, &options)?))
}

#[cfg(not(feature = "redb-backend"))]
fn open_redb(_: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    Err(not_compiled("redb"))
}

#[cfg(feature = "mongo-backend")]
fn open_mongo(config: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    let options = MongoOptions {
        database: config.database.clone(),
        collection: config.collection.clone(),
        timeout: config.timeout(),
    };
    Ok(Box::new(MongoBackend::connect_with(&config.uri, &options)?))
}

#[cfg(not(feature = "mongo-backend"))]
fn open_mongo(_: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    Err(not_compiled("mongo"))
}

#[cfg(feature = "dgraph-backend")]
fn open_dgraph(config: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    let options = DgraphOptions {
        timeout: config.timeout(),
        init_schema: config.init_schema,
    };
    Ok(Box::new(DgraphBackend::connect_with(&config.endpoint, &options)?))
}

#[cfg(not(feature = "dgraph-backend"))]
fn open_dgraph(_: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    Err(not_compiled("dgraph"))
}

#[cfg(any(
    not(feature = "redb-backend"),
    not(feature = "mongo-backend"),
    not(feature = "dgraph-backend")
))]
fn not_compiled(name: &str) -> crate::error::Error {
    crate::error::Error::Config(format!("the {name} backend is not enabled in this build"))
}
