//! `sessionstore keygen` command implementation.

use crate::error::{Error, Result};
use crate::identifier::generate_random_key;

/// Length of generated authentication keys.
const AUTH_KEY_BYTES: usize = 64;

/// Run the keygen command.
///
/// Prints a `[[keys]]` entry ready to paste into the config file.
///
/// # Errors
///
/// Returns an error if `encryption_bytes` is not 0, 16, 24 or 32.
pub fn run(encryption_bytes: usize) -> Result<()> {
    print!("{}", generate(encryption_bytes)?);
    Ok(())
}

fn generate(encryption_bytes: usize) -> Result<String> {
    if !matches!(encryption_bytes, 0 | 16 | 24 | 32) {
        return Err(Error::Config(format!(
            "encryption key must be 16, 24 or 32 bytes, got {encryption_bytes}"
        )));
    }

    let auth = hex::encode(generate_random_key(AUTH_KEY_BYTES));
    let mut entry = format!("[[keys]]\nauth = \"{auth}\"\n");
    if encryption_bytes > 0 {
        let encryption = hex::encode(generate_random_key(encryption_bytes));
        entry.push_str(&format!("encryption = \"{encryption}\"\n"));
    }
    Ok(entry)
}
