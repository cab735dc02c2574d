//! Session identifiers and random key material.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// Random bytes behind every session identifier (256 bits).
pub const IDENTIFIER_BYTES: usize = 32;

/// Generate a fresh session identifier.
///
/// Draws 32 bytes from the operating system CSPRNG and encodes them as
/// URL-safe base64 without padding, so the result is usable verbatim as a
/// cookie value and a storage key. Collisions are not checked.
#[must_use]
pub fn generate_identifier() -> String {
    URL_SAFE_NO_PAD.encode(generate_random_key(IDENTIFIER_BYTES))
}

/// Generate `len` bytes of random key material.
#[must_use]
pub fn generate_random_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    OsRng.fill_bytes(&mut key);
    key
}

/// Check that an identifier only uses the URL-safe base64 alphabet.
///
/// Backends that interpolate identifiers into a query language call this
/// before building the query.
#[must_use]
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifier_has_no_padding() {
        let id = generate_identifier();
        assert_eq!(id.len(), 43);
        assert!(!id.contains('='));
        assert!(is_valid_identifier(&id));
    }

    #[test]
    fn identifier_decodes_to_256_bits() {
        let id = generate_identifier();
        let raw = URL_SAFE_NO_PAD.decode(id).unwrap();
        assert_eq!(raw.len(), IDENTIFIER_BYTES);
    }

    #[test]
    fn identifiers_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_identifier()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn random_key_has_requested_length() {
        assert_eq!(generate_random_key(16).len(), 16);
        assert_eq!(generate_random_key(64).len(), 64);
        assert_ne!(generate_random_key(32), generate_random_key(32));
    }

    #[test]
    fn rejects_query_metacharacters() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("abc\"def"));
        assert!(!is_valid_identifier("abc def"));
        assert!(!is_valid_identifier("a=b"));
        assert!(is_valid_identifier("abc-DEF_123"));
    }
}
