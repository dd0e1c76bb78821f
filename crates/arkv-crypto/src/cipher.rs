//! AES-256-GCM payload encryption/decryption
//!
//! Payload format:
//! ```text
//! data      = [N bytes: ciphertext][16 bytes: GCM tag]
//! cipherIV  = base64(12-byte random nonce), carried as a record tag
//! cipher    = "AES256-GCM", carried as a record tag
//! ```
//!
//! The nonce is generated here on every call and never accepted from the
//! caller, so a (key, nonce) pair cannot repeat short of an RNG failure.

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult, IntegrityFailure};
use crate::keys::FileKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Cipher identifier carried in the `cipher` record tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherKind {
    #[serde(rename = "AES256-GCM")]
    Aes256Gcm,
}

impl CipherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherKind::Aes256Gcm => "AES256-GCM",
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherKind {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES256-GCM" => Ok(CipherKind::Aes256Gcm),
            other => Err(CryptoError::Record(format!("unsupported cipher {other:?}"))),
        }
    }
}

/// Output of [`encrypt`]. Immutable; decrypt it once with [`EncryptedPayload::decrypt`]
/// or hand `data` and `cipher_iv` to the transport.
#[derive(Clone)]
pub struct EncryptedPayload {
    cipher: CipherKind,
    cipher_iv: String,
    data: Vec<u8>,
}

impl EncryptedPayload {
    pub fn cipher(&self) -> CipherKind {
        self.cipher
    }

    /// Base64 nonce, as carried in the `cipherIV` tag.
    pub fn cipher_iv(&self) -> &str {
        &self.cipher_iv
    }

    /// Ciphertext with the GCM tag appended.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Ciphertext without the tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.data[..self.data.len() - TAG_SIZE]
    }

    /// The 16-byte authentication tag.
    pub fn tag(&self) -> &[u8] {
        &self.data[self.data.len() - TAG_SIZE..]
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn decrypt(&self, file_key: &FileKey) -> CryptoResult<Vec<u8>> {
        decrypt(&self.cipher_iv, file_key, &self.data)
    }
}

impl fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedPayload")
            .field("cipher", &self.cipher)
            .field("cipher_iv", &self.cipher_iv)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Encrypt `plaintext` under `file_key` with a fresh random nonce.
pub fn encrypt(file_key: &FileKey, plaintext: &[u8]) -> CryptoResult<EncryptedPayload> {
    let cipher = Aes256Gcm::new(file_key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let data = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Cipher(format!("AES-256-GCM: {e}")))?;

    Ok(EncryptedPayload {
        cipher: CipherKind::Aes256Gcm,
        cipher_iv: B64.encode(nonce_bytes),
        data,
    })
}

/// Decrypt `data` (`ciphertext || tag`) under `file_key` and the base64 nonce.
///
/// Fails closed: any malformed input or tag mismatch is an
/// [`CryptoError::Integrity`] and no plaintext is returned.
pub fn decrypt(cipher_iv: &str, file_key: &FileKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let nonce_bytes = B64
        .decode(cipher_iv.trim())
        .map_err(|_| integrity_failure(IntegrityFailure::MalformedNonce))?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(integrity_failure(IntegrityFailure::MalformedNonce));
    }
    if data.len() < TAG_SIZE {
        return Err(integrity_failure(IntegrityFailure::Truncated));
    }

    let (ciphertext, tag) = data.split_at(data.len() - TAG_SIZE);
    let cipher = Aes256Gcm::new(file_key.as_bytes().into());

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&nonce_bytes),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| integrity_failure(IntegrityFailure::TagMismatch))?;

    Ok(buffer)
}

fn integrity_failure(reason: IntegrityFailure) -> CryptoError {
    tracing::warn!(?reason, "authenticated decryption rejected");
    CryptoError::Integrity(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn key(byte: u8) -> FileKey {
        FileKey::from_bytes([byte; KEY_SIZE])
    }

    fn assert_integrity<T: fmt::Debug>(result: CryptoResult<T>) {
        match result {
            Err(CryptoError::Integrity(_)) => {}
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let k = key(0x42);
        let plaintext = b"hello, encrypted archive!";

        let payload = encrypt(&k, plaintext).unwrap();
        let decrypted = decrypt(payload.cipher_iv(), &k, payload.data()).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let k = key(0x42);
        let payload = encrypt(&k, b"").unwrap();

        assert_eq!(payload.data().len(), TAG_SIZE);
        assert!(payload.ciphertext().is_empty());
        assert_eq!(payload.decrypt(&k).unwrap(), b"");
    }

    #[test]
    fn test_large_buffer_roundtrip() {
        let k = key(0x42);
        let plaintext: Vec<u8> = (0..(1024 * 1024 + 4099)).map(|i| (i * 31 % 251) as u8).collect();

        let payload = encrypt(&k, &plaintext).unwrap();
        assert_eq!(payload.decrypt(&k).unwrap(), plaintext);
    }

    #[test]
    fn test_payload_shape() {
        let payload = encrypt(&key(1), &[0u8; 1000]).unwrap();

        // ciphertext (1000) + tag (16)
        assert_eq!(payload.data().len(), 1000 + TAG_SIZE);
        assert_eq!(payload.tag().len(), TAG_SIZE);
        assert_eq!(payload.cipher(), CipherKind::Aes256Gcm);
        assert_eq!(payload.cipher().to_string(), "AES256-GCM");
        // 12 bytes → 16 base64 chars, no padding
        assert_eq!(payload.cipher_iv().len(), 16);
        assert_eq!(B64.decode(payload.cipher_iv()).unwrap().len(), NONCE_SIZE);
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let k = key(9);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let payload = encrypt(&k, b"same plaintext").unwrap();
            assert!(seen.insert(payload.cipher_iv().to_string()), "nonce reused");
        }
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let payload = encrypt(&key(1), b"secret data").unwrap();
        assert_integrity(payload.decrypt(&key(2)));
    }

    #[test]
    fn test_truncated_data() {
        let payload = encrypt(&key(1), b"secret data").unwrap();
        let err = decrypt(payload.cipher_iv(), &key(1), &payload.data()[..TAG_SIZE - 1]).unwrap_err();
        assert!(matches!(err, CryptoError::Integrity(IntegrityFailure::Truncated)));
    }

    #[test]
    fn test_dropped_tag_byte() {
        let payload = encrypt(&key(1), b"secret data").unwrap();
        let data = payload.data();
        assert_integrity(decrypt(payload.cipher_iv(), &key(1), &data[..data.len() - 1]));
    }

    #[test]
    fn test_malformed_nonce() {
        let payload = encrypt(&key(1), b"secret data").unwrap();

        for bad in ["", "not base64!", "AAAA", "AAAAAAAAAAAAAAAAAAAAAAAA"] {
            let err = decrypt(bad, &key(1), payload.data()).unwrap_err();
            assert!(
                matches!(err, CryptoError::Integrity(IntegrityFailure::MalformedNonce)),
                "{bad:?} → {err:?}"
            );
        }
    }

    #[test]
    fn test_integrity_message_is_user_facing() {
        let payload = encrypt(&key(1), b"x").unwrap();
        let err = payload.decrypt(&key(2)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to decrypt: check your credentials or data integrity"
        );
        assert!(err.is_integrity());
    }

    #[test]
    fn test_cipher_kind_parse() {
        assert_eq!("AES256-GCM".parse::<CipherKind>().unwrap(), CipherKind::Aes256Gcm);
        assert!(matches!(
            "aes-256-gcm".parse::<CipherKind>(),
            Err(CryptoError::Record(_))
        ));
    }

    proptest! {
        #[test]
        fn roundtrip(k in any::<[u8; 32]>(), plaintext in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            let k = FileKey::from_bytes(k);
            let payload = encrypt(&k, &plaintext).unwrap();
            prop_assert_eq!(payload.decrypt(&k).unwrap(), plaintext);
        }

        #[test]
        fn any_data_bit_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..=256),
            pos in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let k = key(0x33);
            let payload = encrypt(&k, &plaintext).unwrap();
            let mut data = payload.data().to_vec();
            let i = pos.index(data.len());
            data[i] ^= 1 << bit;

            let result = decrypt(payload.cipher_iv(), &k, &data);
            prop_assert!(matches!(result, Err(CryptoError::Integrity(IntegrityFailure::TagMismatch))));
        }

        #[test]
        fn any_nonce_bit_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..=256),
            pos in 0usize..NONCE_SIZE,
            bit in 0u8..8,
        ) {
            let k = key(0x33);
            let payload = encrypt(&k, &plaintext).unwrap();
            let mut nonce = B64.decode(payload.cipher_iv()).unwrap();
            nonce[pos] ^= 1 << bit;

            let result = decrypt(&B64.encode(&nonce), &k, payload.data());
            prop_assert!(matches!(result, Err(CryptoError::Integrity(IntegrityFailure::TagMismatch))));
        }
    }
}
