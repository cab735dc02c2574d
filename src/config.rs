//! Configuration loading and management.
//!
//! Configuration is loaded with the following precedence:
//! 1. Environment variables (`SESSIONSTORE_*`)
//! 2. Config file (`~/.sessionstore/config.toml`)
//! 3. Defaults

use crate::codec::KeyPair;
use crate::error::{Error, Result};
use crate::session::SessionOptions;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Key pairs, newest first.
    pub keys: Vec<KeyConfig>,

    /// Store-wide cookie defaults.
    pub cookie: SessionOptions,

    /// Max encoded length for codec output. 0 means unlimited.
    pub max_length: usize,
}

impl Config {
    /// Decode and validate the configured key pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no keys are configured, a key is not
    /// valid hex, or a key has an unusable length.
    pub fn key_pairs(&self) -> Result<Vec<KeyPair>> {
        if self.keys.is_empty() {
            return Err(Error::Config("at least one key pair is required".to_string()));
        }
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| key.to_pair().map_err(|e| Error::Config(format!("keys[{i}]: {e}"))))
            .collect()
    }
}

/// Which backend holds the sessions.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded redb database (default).
    #[default]
    Redb,

    /// MongoDB collection.
    Mongo,

    /// Dgraph nodes.
    Dgraph,

    /// Process memory. Sessions are lost on exit.
    Memory,
}

impl BackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "redb" => Some(Self::Redb),
            "mongo" | "mongodb" => Some(Self::Mongo),
            "dgraph" => Some(Self::Dgraph),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use.
    pub backend: BackendKind,

    /// Directory for the redb database.
    pub path: PathBuf,

    /// MongoDB connection string.
    pub uri: String,

    /// MongoDB database name.
    pub database: String,

    /// MongoDB collection name.
    pub collection: String,

    /// Dgraph HTTP endpoint.
    pub endpoint: String,

    /// Timeout for remote backend calls, in seconds.
    pub timeout_seconds: u64,

    /// Declare the Dgraph schema when connecting.
    pub init_schema: bool,

    /// redb page cache size in bytes.
    pub cache_size: Option<usize>,
}

impl StorageConfig {
    /// Remote call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: env::temp_dir().join("sessionstore"),
            uri: "mongodb://localhost:27017".to_string(),
            database: "sessions".to_string(),
            collection: "store".to_string(),
            endpoint: "http://localhost:8080".to_string(),
            timeout_seconds: 5,
            init_schema: true,
            cache_size: None,
        }
    }
}

/// One configured key pair, hex encoded.
#[derive(Clone, Deserialize)]
pub struct KeyConfig {
    /// Authentication key (hex).
    pub auth: String,

    /// Optional encryption key (hex, 16/24/32 bytes decoded).
    #[serde(default)]
    pub encryption: Option<String>,
}

impl KeyConfig {
    fn to_pair(&self) -> Result<KeyPair> {
        let auth = hex::decode(self.auth.trim())
            .map_err(|e| Error::Config(format!("auth key is not hex: {e}")))?;
        let encryption = self
            .encryption
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| {
                hex::decode(key).map_err(|e| Error::Config(format!("encryption key is not hex: {e}")))
            })
            .transpose()?;
        KeyPair::new(auth, encryption)
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("auth", &"[REDACTED]")
            .field("encryption", &self.encryption.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Get the default sessionstore home directory.
fn default_home() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(".sessionstore"), |h| h.join(".sessionstore"))
}

/// Load configuration with precedence: env vars → file → defaults.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    let config_path = get_config_path();
    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("{}: {e}", config_path.display())))?;
        config = toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
    }

    apply_overrides(&mut config, |key| env::var(key).ok());

    Ok(config)
}

/// Get the path to the config file.
fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var("SESSIONSTORE_CONFIG") {
        return PathBuf::from(path);
    }

    if let Ok(home) = env::var("SESSIONSTORE_HOME") {
        return PathBuf::from(home).join("config.toml");
    }

    default_home().join("config.toml")
}

/// Apply `SESSIONSTORE_*` overrides read through `lookup`.
fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    // Storage
    if let Some(kind) = lookup("SESSIONSTORE_BACKEND").as_deref().and_then(BackendKind::parse) {
        config.storage.backend = kind;
    }
    if let Some(path) = lookup("SESSIONSTORE_PATH") {
        config.storage.path = PathBuf::from(path);
    }
    if let Some(uri) = lookup("SESSIONSTORE_URI") {
        config.storage.uri = uri;
    }
    if let Some(endpoint) = lookup("SESSIONSTORE_ENDPOINT") {
        config.storage.endpoint = endpoint;
    }
    if let Some(secs) = lookup("SESSIONSTORE_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
        config.storage.timeout_seconds = secs;
    }

    // Cookie
    if let Some(age) = lookup("SESSIONSTORE_MAX_AGE").and_then(|v| v.parse().ok()) {
        config.cookie.max_age = age;
    }

    // Keys: a single pair from the environment replaces the file's list
    if let Some(auth) = lookup("SESSIONSTORE_AUTH_KEY") {
        config.keys = vec![KeyConfig {
            auth,
            encryption: lookup("SESSIONSTORE_ENCRYPTION_KEY"),
        }];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.storage.backend, BackendKind::Redb);
        assert_eq!(config.storage.timeout(), Duration::from_secs(5));
        assert_eq!(config.cookie.max_age, 86400 * 30);
        assert_eq!(config.cookie.path, "/");
        assert_eq!(config.max_length, 0);
        assert!(config.keys.is_empty());
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
            max_length = 8192

            [storage]
            backend = "dgraph"
            endpoint = "http://dgraph:8080"
            timeout_seconds = 2
            init_schema = false

            [[keys]]
            auth = "000102030405060708090a0b0c0d0e0f"
            encryption = "000102030405060708090a0b0c0d0e0f"

            [[keys]]
            auth = "ffeeddccbbaa"

            [cookie]
            path = "/app"
            max_age = 3600
            http_only = true
            same_site = "strict"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Dgraph);
        assert_eq!(config.storage.endpoint, "http://dgraph:8080");
        assert!(!config.storage.init_schema);
        assert_eq!(config.max_length, 8192);
        assert_eq!(config.cookie.path, "/app");
        assert!(config.cookie.http_only);
        assert_eq!(config.cookie.same_site, crate::cookie::SameSite::Strict);

        let pairs = config.key_pairs().unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].encrypts());
        assert!(!pairs[1].encrypts());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml = r#"
            [storage]
            backend = "mongo"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Mongo);
        assert_eq!(config.storage.database, "sessions");
        assert_eq!(config.storage.collection, "store");
        assert_eq!(config.cookie.max_age, 86400 * 30); // Default
    }

    #[test]
    fn missing_keys_is_config_error() {
        let config = Config::default();
        assert!(matches!(config.key_pairs(), Err(Error::Config(_))));
    }

    #[test]
    fn bad_hex_is_config_error() {
        let config = Config {
            keys: vec![KeyConfig {
                auth: "not hex".to_string(),
                encryption: None,
            }],
            ..Config::default()
        };
        let err = config.key_pairs().unwrap_err();
        assert!(err.to_string().contains("keys[0]"));
    }

    #[test]
    fn bad_encryption_length_is_config_error() {
        let config = Config {
            keys: vec![KeyConfig {
                auth: "00ff".to_string(),
                encryption: Some("00ff".to_string()),
            }],
            ..Config::default()
        };
        assert!(matches!(config.key_pairs(), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SESSIONSTORE_BACKEND", "MongoDB"),
            ("SESSIONSTORE_URI", "mongodb://db:27017"),
            ("SESSIONSTORE_TIMEOUT_SECONDS", "9"),
            ("SESSIONSTORE_MAX_AGE", "-1"),
            ("SESSIONSTORE_AUTH_KEY", "abcd"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides(&mut config, |key| env.get(key).map(ToString::to_string));

        assert_eq!(config.storage.backend, BackendKind::Mongo);
        assert_eq!(config.storage.uri, "mongodb://db:27017");
        assert_eq!(config.storage.timeout_seconds, 9);
        assert_eq!(config.cookie.max_age, -1);
        assert_eq!(config.keys.len(), 1);
        assert!(config.keys[0].encryption.is_none());
    }

    #[test]
    fn unknown_backend_override_is_ignored() {
        let mut config = Config::default();
        apply_overrides(&mut config, |key| {
            (key == "SESSIONSTORE_BACKEND").then(|| "cassandra".to_string())
        });
        assert_eq!(config.storage.backend, BackendKind::Redb);
    }

    #[test]
    fn key_config_debug_is_redacted() {
        let key = KeyConfig {
            auth: "deadbeef".to_string(),
            encryption: None,
        };
        assert!(!format!("{key:?}").contains("deadbeef"));
    }
}
