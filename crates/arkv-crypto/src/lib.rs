//! arkv-crypto: client-side encryption core for arkv archives
//!
//! Every key is re-derivable from the wallet and the user's secret, so no
//! derived key is ever persisted.
//!
//! Key hierarchy:
//! ```text
//! Wallet Key (RSA, loaded at login)
//!   └── RSA-PSS(SHA-256, salt_len = 0) over "drive" || archive_id
//!       └── Archive Key (HKDF-SHA256, ikm = signature, info = user secret)
//!           └── File Key (HKDF-SHA256, ikm = archive key, info = file_id)
//!               └── AES-256-GCM (nonce = random 96-bit, tag = 128-bit)
//! ```
//!
//! Archive keys are cached per [`Session`]; file keys are derived per operation.

pub mod cache;
pub mod cipher;
pub mod error;
pub mod ids;
pub mod kdf;
pub mod keys;
pub mod metadata;
pub mod record;
pub mod session;
pub mod wallet;

pub use cache::KeyCache;
pub use cipher::{decrypt, encrypt, CipherKind, EncryptedPayload};
pub use error::{CryptoError, CryptoResult, IntegrityFailure};
pub use ids::{ArchiveId, FileId};
pub use kdf::{derive_archive_key, derive_file_key, hkdf_expand, HashAlgorithm, HkdfParams};
pub use keys::{ArchiveKey, FileKey};
pub use metadata::{decrypt_metadata, encrypt_metadata};
pub use record::{RecordKind, RecordTags, Tag};
pub use session::Session;
pub use wallet::WalletKey;

/// Size of archive and file keys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
