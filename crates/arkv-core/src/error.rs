use arkv_crypto::CryptoError;
use thiserror::Error;

pub type ArkvResult<T> = Result<T, ArkvError>;

#[derive(Debug, Error)]
pub enum ArkvError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArkvError {
    /// True when the underlying failure is a decryption integrity check.
    pub fn is_integrity(&self) -> bool {
        matches!(self, ArkvError::Crypto(e) if e.is_integrity())
    }
}
