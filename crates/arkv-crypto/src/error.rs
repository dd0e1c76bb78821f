use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Wallet key material is malformed, unsupported, or public-only.
    #[error("invalid wallet key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// An identifier or HKDF parameter was malformed. Always a caller bug.
    #[error("key derivation failed: {0}")]
    Derivation(String),

    /// Authenticated decryption failed. Carries no plaintext.
    #[error("unable to decrypt: check your credentials or data integrity")]
    Integrity(IntegrityFailure),

    #[error("encryption failed: {0}")]
    Cipher(String),

    /// A transport tag set or decrypted metadata body could not be interpreted.
    #[error("malformed record: {0}")]
    Record(String),
}

/// Why an authenticated decryption was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityFailure {
    /// The nonce was not valid base64 or not 12 bytes long.
    MalformedNonce,
    /// The ciphertext was shorter than a GCM tag.
    Truncated,
    /// Tag verification failed: wrong key, or the ciphertext, tag or nonce was altered.
    TagMismatch,
}

impl CryptoError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, CryptoError::Integrity(_))
    }
}
