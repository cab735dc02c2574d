//! sessionstore - Server-side sessions behind signed cookies.
//!
//! The cookie carries an authenticated (optionally encrypted) session
//! identifier; session values live in a pluggable backend: an embedded redb
//! database, a MongoDB collection, Dgraph nodes, or process memory.
//!
//! ```no_run
//! use http::HeaderMap;
//! use sessionstore::{KeyPair, Registry, SessionStore};
//! use sessionstore::storage::MemoryBackend;
//!
//! # fn main() -> sessionstore::Result<()> {
//! let pair = KeyPair::authenticated(b"a-long-random-authentication-key".to_vec())?;
//! let store = SessionStore::new(MemoryBackend::new(), &[pair])?;
//!
//! let request = HeaderMap::new();
//! let mut response = HeaderMap::new();
//! let mut registry = Registry::new(&request);
//!
//! let (session, _) = store.get(&mut registry, "app");
//! session.insert("user", "u1")?;
//! store.save(&mut response, session)?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod cookie;
pub mod error;
pub mod identifier;
pub mod registry;
pub mod session;
pub mod storage;
pub mod store;

pub use codec::{KeyPair, SecureCodec};
pub use config::Config;
pub use cookie::{Cookie, CookieSink, CookieSource, SameSite};
pub use error::{CryptoError, Error, Result, StorageError};
pub use registry::Registry;
pub use session::{Session, SessionOptions, SessionValues};
pub use store::SessionStore;
