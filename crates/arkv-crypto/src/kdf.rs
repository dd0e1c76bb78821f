//! Key derivation: wallet signature → archive key → file key
//!
//! Archive separation happens in the signed message (`"drive" || archive_id`);
//! file separation happens in the HKDF info field. Neither level uses an HKDF
//! salt, so both derivations are pure functions of their inputs.

use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::ids::{ArchiveId, FileId};
use crate::keys::{ArchiveKey, FileKey};
use crate::wallet::WalletKey;
use crate::KEY_SIZE;

/// Domain tag prefixed to the archive id in the wallet-signed message.
pub const ARCHIVE_DOMAIN: &[u8] = b"drive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

/// Everything HKDF needs, and nothing else.
pub struct HkdfParams<'a> {
    /// Input keying material
    pub secret: &'a [u8],
    /// Context / domain-separation string
    pub info: &'a [u8],
    pub hash: HashAlgorithm,
    /// Output length in bytes (at most 255 × digest size)
    pub output_len: usize,
}

impl std::fmt::Debug for HkdfParams<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HkdfParams")
            .field("secret", &"[REDACTED]")
            .field("info_len", &self.info.len())
            .field("hash", &self.hash)
            .field("output_len", &self.output_len)
            .finish()
    }
}

/// HKDF extract-then-expand with an empty salt.
pub fn hkdf_expand(params: &HkdfParams<'_>) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let mut okm = Zeroizing::new(vec![0u8; params.output_len]);
    let result = match params.hash {
        HashAlgorithm::Sha256 => {
            Hkdf::<Sha256>::new(None, params.secret).expand(params.info, okm.as_mut_slice())
        }
        HashAlgorithm::Sha512 => {
            Hkdf::<Sha512>::new(None, params.secret).expand(params.info, okm.as_mut_slice())
        }
    };
    result.map_err(|e| {
        CryptoError::Derivation(format!(
            "HKDF-{:?} cannot produce {} bytes: {e}",
            params.hash, params.output_len
        ))
    })?;
    Ok(okm)
}

/// Derive the 256-bit key for one archive.
///
/// `signature = RSA-PSS(wallet, "drive" || archive_id)`, then
/// `HKDF-SHA256(ikm = signature, info = user_secret)`.
pub fn derive_archive_key(
    wallet: &WalletKey,
    archive_id: &ArchiveId,
    user_secret: &SecretString,
) -> CryptoResult<ArchiveKey> {
    let mut message = Vec::with_capacity(ARCHIVE_DOMAIN.len() + 16);
    message.extend_from_slice(ARCHIVE_DOMAIN);
    message.extend_from_slice(archive_id.as_bytes());

    let signature = Zeroizing::new(wallet.sign(&message)?);
    let okm = hkdf_expand(&HkdfParams {
        secret: signature.as_slice(),
        info: user_secret.expose_secret().as_bytes(),
        hash: HashAlgorithm::Sha256,
        output_len: KEY_SIZE,
    })?;

    tracing::debug!(%archive_id, "derived archive key");
    Ok(ArchiveKey::from_bytes(to_key_bytes(&okm)))
}

/// Derive the 256-bit key for one file: `HKDF-SHA256(ikm = archive_key, info = file_id)`.
///
/// One-way: a leaked file key reveals neither the archive key nor its siblings.
pub fn derive_file_key(file_id: &FileId, archive_key: &ArchiveKey) -> CryptoResult<FileKey> {
    let okm = hkdf_expand(&HkdfParams {
        secret: archive_key.as_bytes(),
        info: file_id.as_bytes(),
        hash: HashAlgorithm::Sha256,
        output_len: KEY_SIZE,
    })?;
    Ok(FileKey::from_bytes(to_key_bytes(&okm)))
}

fn to_key_bytes(okm: &[u8]) -> [u8; KEY_SIZE] {
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&okm[..KEY_SIZE]);
    bytes
}
