//! Login session: the wallet key plus its archive key cache
//!
//! A `Session` is an explicit value rather than process-global state, so
//! several wallets (or tests) can run side by side without sharing keys.

use secrecy::SecretString;

use crate::cache::KeyCache;
use crate::cipher::{self, EncryptedPayload};
use crate::error::CryptoResult;
use crate::ids::{ArchiveId, FileId};
use crate::kdf::{derive_archive_key, derive_file_key};
use crate::keys::{ArchiveKey, FileKey};
use crate::wallet::WalletKey;

#[derive(Debug)]
pub struct Session {
    wallet: WalletKey,
    /// `None` when archive key caching is disabled.
    cache: Option<KeyCache>,
}

impl Session {
    /// Start a session for `wallet` with archive key caching enabled.
    pub fn login(wallet: WalletKey) -> Self {
        tracing::info!(address = %wallet.address(), "session started");
        Self {
            wallet,
            cache: Some(KeyCache::new()),
        }
    }

    /// Enable or disable archive key caching. Disabling drops any cached keys.
    pub fn with_key_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(KeyCache::new);
        self
    }

    pub fn address(&self) -> String {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &WalletKey {
        &self.wallet
    }

    /// Archive key for `archive_id`, from the cache when possible.
    ///
    /// The cache is keyed by archive id alone: within one session the first
    /// secret used for an archive determines its key. A mistyped first secret
    /// therefore makes every later decrypt in that archive fail with
    /// [`CryptoError::Integrity`](crate::CryptoError::Integrity), even with
    /// the right secret, until [`Session::forget_archive`] or logout.
    pub fn archive_key(
        &self,
        archive_id: &ArchiveId,
        user_secret: &SecretString,
    ) -> CryptoResult<ArchiveKey> {
        match &self.cache {
            Some(cache) => cache.get_or_derive(archive_id, &self.wallet, user_secret),
            None => derive_archive_key(&self.wallet, archive_id, user_secret),
        }
    }

    /// File key for `file_id` in `archive_id`. Derived fresh on every call.
    pub fn file_key(
        &self,
        archive_id: &ArchiveId,
        file_id: &FileId,
        user_secret: &SecretString,
    ) -> CryptoResult<FileKey> {
        let archive_key = self.archive_key(archive_id, user_secret)?;
        derive_file_key(file_id, &archive_key)
    }

    pub fn encrypt(
        &self,
        archive_id: &ArchiveId,
        file_id: &FileId,
        user_secret: &SecretString,
        plaintext: &[u8],
    ) -> CryptoResult<EncryptedPayload> {
        let file_key = self.file_key(archive_id, file_id, user_secret)?;
        cipher::encrypt(&file_key, plaintext)
    }

    pub fn decrypt(
        &self,
        archive_id: &ArchiveId,
        file_id: &FileId,
        user_secret: &SecretString,
        cipher_iv: &str,
        data: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let file_key = self.file_key(archive_id, file_id, user_secret)?;
        cipher::decrypt(cipher_iv, &file_key, data)
    }

    /// Number of archive keys currently cached.
    /// Drop the cached key for `archive_id` so the next lookup derives again
    /// from the secret it is given.
    pub fn forget_archive(&self, archive_id: &ArchiveId) {
        if let Some(cache) = &self.cache {
            cache.remove(archive_id);
            tracing::debug!(%archive_id, "archive key forgotten");
        }
    }

    pub fn cached_archives(&self) -> usize {
        self.cache.as_ref().map_or(0, KeyCache::len)
    }

    /// End the session: cached keys are dropped (and zeroized) with the wallet.
    pub fn logout(self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        tracing::info!(address = %self.wallet.address(), "session ended");
    }
}
