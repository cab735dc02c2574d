//! `sessionstore show` command implementation.

use crate::config::load_config;
use crate::error::Result;
use crate::store::SessionStore;

/// Run the show command.
///
/// Prints the stored values of session `id` as JSON.
///
/// # Errors
///
/// Returns an error if the store cannot be built, the session is not stored,
/// or its payload does not decode under cookie name `name`.
pub fn run(name: &str, id: &str) -> Result<()> {
    let store = SessionStore::from_config(&load_config()?)?;
    let session = store.lookup(name, id)?;

    let json = serde_json::to_string_pretty(session.values())?;
    println!("{json}");

    Ok(())
}
