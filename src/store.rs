//! Session lifecycle: load, save, expire and administer sessions.
//!
//! The cookie carries only the authenticated session identifier. Values live
//! in the backend, encoded by the same codecs under the same cookie name.
//!
//! ```text
//! request cookie ─decode─▶ identifier ─backend.get─▶ payload ─decode─▶ values
//! values ─encode─▶ payload ─backend.put─▶ identifier ─encode─▶ response cookie
//! ```

use crate::codec::{KeyPair, SecureCodec, codecs_from_pairs, decode_multi, encode_multi};
use crate::config::Config;
use crate::cookie::{Cookie, CookieSink, CookieSource};
use crate::error::{Error, Result, StorageError};
use crate::identifier::generate_identifier;
use crate::registry::Registry;
use crate::session::{Session, SessionOptions, SessionValues};
use crate::storage::{SessionBackend, open_backend};
use std::fmt;
use tracing::{debug, warn};

/// Characters of an identifier that may appear in logs.
const LOGGED_ID_CHARS: usize = 8;

fn short_id(id: &str) -> &str {
    id.get(..LOGGED_ID_CHARS).unwrap_or(id)
}

/// Session store over one backend and an ordered set of key pairs.
///
/// Key pairs are fixed at construction. The first pair encodes; every pair
/// is tried when decoding, so a retired pair can stay in the list until the
/// cookies it signed have expired.
pub struct SessionStore<B = Box<dyn SessionBackend>> {
    codecs: Vec<SecureCodec>,
    options: SessionOptions,
    backend: B,
}

impl<B> fmt::Debug for SessionStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("codecs", &self.codecs)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Build a store from loaded configuration, opening the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the keys are invalid or the backend cannot
    /// be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let pairs = config.key_pairs()?;
        let backend = open_backend(&config.storage)?;

        let mut store = Self::new(backend, &pairs)?;
        store.options = config.cookie.clone();
        store.set_max_age(config.cookie.max_age);
        store.set_max_length(config.max_length);
        Ok(store)
    }
}

impl<B: SessionBackend> SessionStore<B> {
    /// Create a store with default options (`Path=/`, 30 day max age).
    ///
    /// Encoded payloads have no length limit; call
    /// [`SessionStore::set_max_length`] to impose one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `pairs` is empty or a pair is unusable.
    pub fn new(backend: B, pairs: &[KeyPair]) -> Result<Self> {
        let mut store = Self {
            codecs: codecs_from_pairs(pairs)?,
            options: SessionOptions::default(),
            backend,
        };
        store.set_max_age(store.options.max_age);
        store.set_max_length(0);
        Ok(store)
    }

    /// Store-wide defaults copied into every new session.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Mutable store-wide defaults. Affects sessions created afterwards.
    ///
    /// Changing `max_age` here does not touch the codecs; use
    /// [`SessionStore::set_max_age`] for that.
    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }

    /// Set the default max age and the expiry check of every codec.
    pub fn set_max_age(&mut self, age: i64) {
        self.options.max_age = age;
        for codec in &mut self.codecs {
            codec.set_max_age(age);
        }
    }

    /// Limit encoded cookie and payload length on every codec. 0 disables.
    pub fn set_max_length(&mut self, len: usize) {
        for codec in &mut self.codecs {
            codec.set_max_length(len);
        }
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the session `name` through a per-request registry.
    ///
    /// The first call for a name loads it; later calls return the cached
    /// session and error.
    pub fn get<'a, R: CookieSource + ?Sized>(
        &self,
        registry: &'a mut Registry<'_, R>,
        name: &str,
    ) -> (&'a mut Session, Option<&'a Error>) {
        registry.get(self, name)
    }

    /// Load the session `name` from the request, or start a fresh one.
    ///
    /// Always returns a usable session. When a cookie was present but could
    /// not be resolved (bad signature, expired, no stored record, undecodable
    /// payload) the session is fresh and the first error is returned with it.
    /// A missing cookie is a first visit, not an error.
    pub fn new_session<R: CookieSource + ?Sized>(
        &self,
        request: &R,
        name: &str,
    ) -> (Session, Option<Error>) {
        let Some(cookie) = request.cookie(name) else {
            return (Session::new(name, self.options.clone()), None);
        };

        match self.identifier(name, &cookie).and_then(|id| self.lookup(name, &id)) {
            Ok(session) => {
                debug!(name, id = short_id(session.id()), "loaded session");
                (session, None)
            }
            Err(e) => {
                warn!(name, error = %e, "session cookie rejected, starting fresh session");
                (Session::new(name, self.options.clone()), Some(e))
            }
        }
    }

    /// Like [`SessionStore::new_session`], but as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the load error when a cookie was present but could not be
    /// resolved.
    pub fn load<R: CookieSource + ?Sized>(&self, request: &R, name: &str) -> Result<Session> {
        match self.new_session(request, name) {
            (session, None) => Ok(session),
            (_, Some(e)) => Err(e),
        }
    }

    /// Persist `session` and write its cookie.
    ///
    /// A session whose `max_age` is zero or negative is deleted from the
    /// backend instead, and an expiring cookie is written. Otherwise an
    /// identifier is assigned if needed, values are stored, and the encoded
    /// identifier is written as the cookie value.
    ///
    /// Only the response is taken: everything a save needs (name, identifier,
    /// values, cookie attributes) is already on the session, so there is no
    /// request parameter.
    ///
    /// # Errors
    ///
    /// Returns encode, storage or transport errors. No cookie is written when
    /// encoding or storage fails.
    pub fn save<W: CookieSink + ?Sized>(&self, response: &mut W, session: &mut Session) -> Result<()> {
        if session.options().max_age <= 0 {
            self.delete(session)?;
            debug!(name = session.name(), id = short_id(session.id()), "erased session");
            return response.set_cookie(&Cookie::expired(session.name(), session.options()));
        }

        if session.id().is_empty() {
            session.assign_id(generate_identifier());
        }

        let payload = encode_multi(session.name(), session.values(), &self.codecs)?;
        self.backend.put(session.id(), &payload)?;

        let value = encode_multi(session.name(), session.id(), &self.codecs)?;
        response.set_cookie(&Cookie::new(session.name(), &value, session.options()))?;

        debug!(name = session.name(), id = short_id(session.id()), "saved session");
        Ok(())
    }

    /// Store `session`'s values without touching any cookie.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if the session has never been saved,
    /// otherwise encode or storage errors.
    pub fn edit(&self, session: &Session) -> Result<()> {
        if session.id().is_empty() {
            return Err(Error::InvalidSession(
                "cannot edit a session without an identifier".to_string(),
            ));
        }
        let payload = encode_multi(session.name(), session.values(), &self.codecs)?;
        self.backend.put(session.id(), &payload)
    }

    /// Remove `session`'s stored record without touching any cookie.
    ///
    /// A session that was never saved has nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn delete(&self, session: &Session) -> Result<()> {
        if session.id().is_empty() {
            return Ok(());
        }
        self.backend.delete(session.id())
    }

    /// Authenticate a cookie value and return the identifier it carries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if no key pair validates the value.
    pub fn identifier(&self, name: &str, cookie: &str) -> Result<String> {
        Ok(decode_multi(name, cookie, &self.codecs)?)
    }

    /// Fetch and decode the stored session `id` under cookie name `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no record, a crypto
    /// error if the payload does not decode, or the backend's error.
    pub fn lookup(&self, name: &str, id: &str) -> Result<Session> {
        let payload = self.backend.get(id)?.ok_or(StorageError::NotFound)?;
        let values: SessionValues = decode_multi(name, &payload, &self.codecs)?;
        Ok(Session::from_stored(name, id, values, self.options.clone()))
    }
}
