//! Session data model.

use crate::cookie::SameSite;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Application payload carried by a session.
pub type SessionValues = Map<String, Value>;

/// Cookie-scoped attributes of a session.
///
/// Copied from the store defaults when a session is created; changing them on
/// one session does not affect the store or other sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Cookie `Path`.
    pub path: String,

    /// Cookie `Domain`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Lifetime in seconds. `<= 0` deletes the session on save.
    pub max_age: i64,

    /// Cookie `Secure` flag.
    pub secure: bool,

    /// Cookie `HttpOnly` flag.
    pub http_only: bool,

    /// Cookie `SameSite` policy.
    pub same_site: SameSite,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: 86400 * 30,
            secure: false,
            http_only: false,
            same_site: SameSite::default(),
        }
    }
}

/// Per-client state, referenced by a cookie and persisted by a backend.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    name: String,
    values: SessionValues,
    options: SessionOptions,
    is_new: bool,
}

impl Session {
    /// Create an empty, unsaved session.
    #[must_use]
    pub fn new(name: &str, options: SessionOptions) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            values: SessionValues::new(),
            options,
            is_new: true,
        }
    }

    /// Rebuild a session that already has a stored record.
    ///
    /// Used for out-of-band administration where no request is involved.
    #[must_use]
    pub fn from_stored(name: &str, id: &str, values: SessionValues, options: SessionOptions) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            values,
            options,
            is_new: false,
        }
    }

    /// Session identifier. Empty until the first successful save.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    /// Cookie name this session travels under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until the session has been loaded from the store.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// All values.
    #[must_use]
    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Mutable access to all values.
    pub fn values_mut(&mut self) -> &mut SessionValues {
        &mut self.values
    }

    /// Get a value, deserialized into `T`.
    ///
    /// Returns `None` when the key is missing or holds a different type.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Encode`] if the value cannot be represented.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Remove a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Remove all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Cookie attributes.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Mutable cookie attributes. Set `max_age` to `-1` to delete on save.
    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty_and_new() {
        let session = Session::new("app", SessionOptions::default());
        assert!(session.is_new());
        assert!(session.id().is_empty());
        assert!(session.values().is_empty());
        assert_eq!(session.name(), "app");
    }

    #[test]
    fn typed_values() {
        let mut session = Session::new("app", SessionOptions::default());
        session.insert("user", "u1").unwrap();
        session.insert("visits", 3).unwrap();

        assert_eq!(session.get::<String>("user").as_deref(), Some("u1"));
        assert_eq!(session.get::<u32>("visits"), Some(3));
        assert_eq!(session.get::<u32>("user"), None);
        assert_eq!(session.get::<String>("missing"), None);

        assert!(session.remove("user").is_some());
        session.clear();
        assert!(session.values().is_empty());
    }

    #[test]
    fn options_are_per_session() {
        let defaults = SessionOptions::default();
        let mut session = Session::new("app", defaults.clone());
        session.options_mut().path = "/foo".to_string();
        assert_eq!(defaults.path, "/");
        assert_eq!(session.options().path, "/foo");
    }

    #[test]
    fn default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.path, "/");
        assert_eq!(options.max_age, 2_592_000);
        assert_eq!(options.same_site, SameSite::Default);
    }
}
