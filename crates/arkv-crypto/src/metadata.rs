//! JSON metadata records, encrypted under the same file key as their data
//!
//! Each encryption draws a fresh nonce, so a metadata record and its data
//! record never share a (key, nonce) pair.

use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::cipher::{self, EncryptedPayload};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::FileKey;

pub fn encrypt_metadata<T: Serialize>(
    file_key: &FileKey,
    metadata: &T,
) -> CryptoResult<EncryptedPayload> {
    let json = Zeroizing::new(
        serde_json::to_vec(metadata)
            .map_err(|e| CryptoError::Record(format!("serializing metadata: {e}")))?,
    );
    cipher::encrypt(file_key, &json)
}

/// Authenticate and decrypt first, then parse. A body that authenticates but
/// is not valid JSON for `T` is a [`CryptoError::Record`].
pub fn decrypt_metadata<T: DeserializeOwned>(
    cipher_iv: &str,
    file_key: &FileKey,
    data: &[u8],
) -> CryptoResult<T> {
    let json = Zeroizing::new(cipher::decrypt(cipher_iv, file_key, data)?);
    serde_json::from_slice(&json)
        .map_err(|e| CryptoError::Record(format!("decrypted metadata is not valid JSON: {e}")))
}
