//! Per-request session registry.

use crate::cookie::{CookieSink, CookieSource};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::SessionBackend;
use crate::store::SessionStore;
use std::collections::BTreeMap;

/// Sessions loaded while handling one request.
///
/// Each name is loaded at most once; repeated lookups return the cached
/// session and load error. Create one per request and drop it with the
/// request. It borrows the request and is not meant to be shared.
#[derive(Debug)]
pub struct Registry<'r, R: ?Sized> {
    request: &'r R,
    sessions: BTreeMap<String, (Session, Option<Error>)>,
}

impl<'r, R: CookieSource + ?Sized> Registry<'r, R> {
    /// Create an empty registry for `request`.
    #[must_use]
    pub fn new(request: &'r R) -> Self {
        Self {
            request,
            sessions: BTreeMap::new(),
        }
    }

    /// The request this registry reads cookies from.
    #[must_use]
    pub fn request(&self) -> &'r R {
        self.request
    }

    /// Get session `name`, loading it through `store` on first use.
    pub fn get<B: SessionBackend>(
        &mut self,
        store: &SessionStore<B>,
        name: &str,
    ) -> (&mut Session, Option<&Error>) {
        let request = self.request;
        let (session, error) = self
            .sessions
            .entry(name.to_string())
            .or_insert_with(|| store.new_session(request, name));
        (session, error.as_ref())
    }

    /// Number of sessions loaded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session has been loaded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Save every session obtained through this registry.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first save error.
    pub fn save_all<B: SessionBackend, W: CookieSink + ?Sized>(
        &mut self,
        store: &SessionStore<B>,
        response: &mut W,
    ) -> Result<()> {
        for (session, _) in self.sessions.values_mut() {
            store.save(response, session)?;
        }
        Ok(())
    }
}
