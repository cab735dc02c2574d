//! Authenticated, optionally encrypted value envelopes.
//!
//! A codec serializes a value, encrypts it when an encryption key is set,
//! stamps it with the current time and signs `name|timestamp|payload` with
//! HMAC-SHA256. The cookie name is part of the signed data (and the AEAD
//! associated data), so an envelope minted for one name never validates
//! under another.
//!
//! Layout before transport encoding:
//!
//! ```text
//! <unix timestamp> | base64url(nonce || ciphertext  or  plaintext) | <32-byte MAC>
//! ```
//!
//! Key rotation works by holding several codecs: [`encode_multi`] always uses
//! the first one, [`decode_multi`] accepts anything one of them validates.

use crate::error::{CryptoError, Error, Result};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

type HmacSha256 = Hmac<Sha256>;
type Aes192Gcm = AesGcm<Aes192, U12>;

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Authentication and optional encryption key for one codec.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    auth: Vec<u8>,
    encryption: Option<Vec<u8>>,
}

impl KeyPair {
    /// Create a key pair.
    ///
    /// The authentication key is required; 32 or 64 bytes is recommended.
    /// The encryption key, when present, must be 16, 24 or 32 bytes and
    /// selects AES-128, AES-192 or AES-256.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either key is unusable.
    pub fn new(auth: impl Into<Vec<u8>>, encryption: Option<Vec<u8>>) -> Result<Self> {
        let auth = auth.into();
        if auth.is_empty() {
            return Err(Error::Config("hash key is not set".to_string()));
        }
        if let Some(key) = &encryption {
            if !matches!(key.len(), 16 | 24 | 32) {
                return Err(Error::Config(format!(
                    "invalid encryption key length {} (must be 16, 24 or 32 bytes)",
                    key.len()
                )));
            }
        }
        Ok(Self { auth, encryption })
    }

    /// Authentication-only key pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the key is empty.
    pub fn authenticated(auth: impl Into<Vec<u8>>) -> Result<Self> {
        Self::new(auth, None)
    }

    /// Whether this pair encrypts as well as authenticates.
    #[must_use]
    pub fn encrypts(&self) -> bool {
        self.encryption.is_some()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("auth", &"[REDACTED]")
            .field("encryption", &self.encryption.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Clone)]
enum BlockCipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl BlockCipher {
    fn new(key: &[u8]) -> Result<Self> {
        let invalid = |_| Error::Config(format!("invalid encryption key length {}", key.len()));
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            n => Err(Error::Config(format!(
                "invalid encryption key length {n} (must be 16, 24 or 32 bytes)"
            ))),
        }
    }

    /// Encrypt with a fresh nonce, returning `nonce || ciphertext`.
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        let ciphertext = match self {
            Self::Aes128(c) => c.encrypt(&nonce, payload),
            Self::Aes192(c) => c.encrypt(&nonce, payload),
            Self::Aes256(c) => c.encrypt(&nonce, payload),
        }
        .map_err(|_| Error::Encode("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8], aad: &[u8]) -> std::result::Result<Vec<u8>, CryptoError> {
        if data.len() <= NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        let plaintext = match self {
            Self::Aes128(c) => c.decrypt(nonce, payload),
            Self::Aes192(c) => c.decrypt(nonce, payload),
            Self::Aes256(c) => c.decrypt(nonce, payload),
        };
        plaintext.map_err(|_| CryptoError::Decrypt)
    }
}

/// Encodes and decodes authenticated values under one key pair.
#[derive(Clone)]
pub struct SecureCodec {
    hash_key: Zeroizing<Vec<u8>>,
    block: Option<BlockCipher>,
    max_age: i64,
    min_age: i64,
    max_length: usize,
}

impl SecureCodec {
    /// Default max age for new codecs (one month).
    pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

    /// Default max length for encoded values (browser cookie limit).
    pub const DEFAULT_MAX_LENGTH: usize = 4096;

    /// Create a codec for a key pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the encryption key cannot build a cipher.
    pub fn new(pair: &KeyPair) -> Result<Self> {
        let block = pair.encryption.as_deref().map(BlockCipher::new).transpose()?;
        Ok(Self {
            hash_key: Zeroizing::new(pair.auth.clone()),
            block,
            max_age: Self::DEFAULT_MAX_AGE,
            min_age: 0,
            max_length: Self::DEFAULT_MAX_LENGTH,
        })
    }

    /// Reject values older than `age` seconds. 0 disables the check.
    pub fn set_max_age(&mut self, age: i64) {
        self.max_age = age;
    }

    /// Reject values younger than `age` seconds. 0 disables the check.
    pub fn set_min_age(&mut self, age: i64) {
        self.min_age = age;
    }

    /// Limit encoded values to `len` bytes. 0 disables the check.
    pub fn set_max_length(&mut self, len: usize) {
        self.max_length = len;
    }

    /// Current max age in seconds.
    #[must_use]
    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    /// Encode `value` for the given cookie name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the value cannot be serialized, or
    /// [`CryptoError::ValueTooLong`] if the result exceeds the max length.
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String> {
        self.encode_at(name, value, Utc::now().timestamp())
    }

    pub(crate) fn encode_at<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
        timestamp: i64,
    ) -> Result<String> {
        let mut body = serde_json::to_vec(value)?;
        if let Some(block) = &self.block {
            body = block.encrypt(&body, name.as_bytes())?;
        }
        let body = URL_SAFE.encode(body);

        let timestamp = timestamp.to_string();
        let mac = self.sign(name, timestamp.as_bytes(), body.as_bytes())?;

        let mut envelope = Vec::with_capacity(timestamp.len() + body.len() + mac.len() + 2);
        envelope.extend_from_slice(timestamp.as_bytes());
        envelope.push(b'|');
        envelope.extend_from_slice(body.as_bytes());
        envelope.push(b'|');
        envelope.extend_from_slice(&mac);

        let encoded = URL_SAFE.encode(envelope);
        if self.max_length != 0 && encoded.len() > self.max_length {
            return Err(CryptoError::ValueTooLong.into());
        }
        Ok(encoded)
    }

    /// Decode a value previously produced by [`SecureCodec::encode`].
    ///
    /// # Errors
    ///
    /// Returns the first [`CryptoError`] hit: length, transport encoding,
    /// MAC, timestamp, decryption or deserialization.
    pub fn decode<T: DeserializeOwned>(
        &self,
        name: &str,
        value: &str,
    ) -> std::result::Result<T, CryptoError> {
        if self.max_length != 0 && value.len() > self.max_length {
            return Err(CryptoError::ValueTooLong);
        }
        let raw = URL_SAFE
            .decode(value)
            .map_err(|_| CryptoError::InvalidEncoding)?;

        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(body), Some(mac)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::InvalidEncoding);
        };

        self.verify(name, timestamp, body, mac)?;

        let timestamp: i64 = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or(CryptoError::InvalidTimestamp)?;
        let now = Utc::now().timestamp();
        if self.min_age != 0 && timestamp > now.saturating_sub(self.min_age) {
            return Err(CryptoError::InvalidTimestamp);
        }
        if self.max_age != 0 && timestamp < now.saturating_sub(self.max_age) {
            return Err(CryptoError::ExpiredValue);
        }

        let mut plain = URL_SAFE
            .decode(body)
            .map_err(|_| CryptoError::InvalidEncoding)?;
        if let Some(block) = &self.block {
            plain = block.decrypt(&plain, name.as_bytes())?;
        }
        serde_json::from_slice(&plain).map_err(|e| CryptoError::Deserialize(e.to_string()))
    }

    fn mac(&self, name: &str, timestamp: &[u8], body: &[u8]) -> Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hash_key)
            .map_err(|e| Error::Config(e.to_string()))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(b"|");
        mac.update(body);
        Ok(mac)
    }

    fn sign(&self, name: &str, timestamp: &[u8], body: &[u8]) -> Result<Vec<u8>> {
        Ok(self
            .mac(name, timestamp, body)?
            .finalize()
            .into_bytes()
            .to_vec())
    }

    fn verify(
        &self,
        name: &str,
        timestamp: &[u8],
        body: &[u8],
        tag: &[u8],
    ) -> std::result::Result<(), CryptoError> {
        self.mac(name, timestamp, body)
            .map_err(|_| CryptoError::InvalidMac)?
            .verify_slice(tag)
            .map_err(|_| CryptoError::InvalidMac)
    }
}

impl fmt::Debug for SecureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCodec")
            .field("encrypts", &self.block.is_some())
            .field("max_age", &self.max_age)
            .field("min_age", &self.min_age)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

/// Build one codec per key pair, preserving order.
///
/// # Errors
///
/// Returns [`Error::Config`] if no pairs are given or a pair is unusable.
pub fn codecs_from_pairs(pairs: &[KeyPair]) -> Result<Vec<SecureCodec>> {
    if pairs.is_empty() {
        return Err(Error::Config(CryptoError::NoCodecs.to_string()));
    }
    pairs.iter().map(SecureCodec::new).collect()
}

/// Encode with the first (active) codec.
///
/// # Errors
///
/// Returns [`CryptoError::NoCodecs`] for an empty slice, otherwise whatever
/// the active codec returns.
pub fn encode_multi<T: Serialize + ?Sized>(
    name: &str,
    value: &T,
    codecs: &[SecureCodec],
) -> Result<String> {
    let codec = codecs.first().ok_or(CryptoError::NoCodecs)?;
    codec.encode(name, value)
}

/// Decode with each codec in order, returning the first success.
///
/// # Errors
///
/// When no codec validates the value, returns the first error other than
/// [`CryptoError::InvalidMac`] (a key authenticated the value but it is
/// expired, undecryptable or of the wrong type), else `InvalidMac`.
pub fn decode_multi<T: DeserializeOwned>(
    name: &str,
    value: &str,
    codecs: &[SecureCodec],
) -> std::result::Result<T, CryptoError> {
    let mut first_err = None;
    let mut authenticated_err = None;
    for codec in codecs {
        match codec.decode(name, value) {
            Ok(decoded) => return Ok(decoded),
            Err(CryptoError::InvalidMac) => {
                first_err.get_or_insert(CryptoError::InvalidMac);
            }
            Err(e) => {
                authenticated_err.get_or_insert(e);
            }
        }
    }
    Err(authenticated_err
        .or(first_err)
        .unwrap_or(CryptoError::NoCodecs))
}
