//! Error types for sessionstore.

use thiserror::Error;

/// Result type alias for sessionstore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sessionstore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be serialized for encoding.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Authentication, decryption or expiry check failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The backing store failed or has no such record.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error. Fatal to store construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A session was used in a way its state does not allow.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// A cookie could not be written to the response.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Whether this error means "no such session" rather than a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound))
    }

    /// Whether a storage call ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Timeout))
    }
}

/// Envelope decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The embedded timestamp is older than the configured max age.
    #[error("expired timestamp")]
    ExpiredValue,

    /// MAC verification failed under every key pair.
    #[error("the value is not valid: invalid MAC")]
    InvalidMac,

    /// The transport encoding or envelope layout is malformed.
    #[error("the value is not valid: invalid encoding")]
    InvalidEncoding,

    /// The embedded timestamp is unparsable or too new.
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// The encoded value exceeds the configured max length.
    #[error("the value is too long")]
    ValueTooLong,

    /// Decryption failed.
    #[error("the value could not be decrypted")]
    Decrypt,

    /// The authenticated plaintext did not deserialize into the target type.
    #[error("deserialization failed: {0}")]
    Deserialize(String),

    /// No codecs were configured.
    #[error("no codecs were provided")]
    NoCodecs,
}

/// Storage adapter failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No record exists for the identifier.
    #[error("session not found")]
    NotFound,

    /// The backend did not answer in time.
    #[error("storage operation timed out")]
    Timeout,

    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend rejected or failed the operation.
    #[error("{0}")]
    Backend(String),

    /// A stored record did not have the expected shape.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}
