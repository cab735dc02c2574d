//! `sessionstore delete` command implementation.

use crate::config::load_config;
use crate::error::Result;
use crate::storage::{SessionBackend, open_backend};

/// Run the delete command.
///
/// Removes the stored record for `id`. Deleting an unknown identifier
/// succeeds.
///
/// # Errors
///
/// Returns an error if the backend cannot be opened or the delete fails.
pub fn run(id: &str) -> Result<()> {
    let config = load_config()?;
    let backend = open_backend(&config.storage)?;
    backend.delete(id)?;

    println!("Deleted session {id}");
    Ok(())
}
