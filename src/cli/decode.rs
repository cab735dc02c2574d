//! `sessionstore decode` command implementation.

use crate::config::load_config;
use crate::error::Result;
use crate::storage::SessionBackend;
use crate::store::SessionStore;

/// Run the decode command.
///
/// Authenticates a cookie value, then prints the identifier it carries and
/// the stored session values.
///
/// # Errors
///
/// Returns an error if the store cannot be built, the cookie does not
/// validate, or the session is not stored.
pub fn run(name: &str, cookie: &str) -> Result<()> {
    let store = SessionStore::from_config(&load_config()?)?;
    println!("{}", describe(&store, name, cookie)?);
    Ok(())
}

fn describe<B: SessionBackend>(store: &SessionStore<B>, name: &str, cookie: &str) -> Result<String> {
    let id = store.identifier(name, cookie)?;
    let session = store.lookup(name, &id)?;
    let values = serde_json::to_string_pretty(session.values())?;
    Ok(format!("Session: {id}\n{values}"))
}
