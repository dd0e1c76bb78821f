//! Session-scoped archive key cache
//!
//! Archive derivation costs an RSA private-key operation, so each archive key
//! is derived once per session and reused. Concurrent first requests for the
//! same archive are coalesced: every archive gets its own slot mutex, and the
//! map lock is only held long enough to find or create that slot. Unrelated
//! archives never wait on each other's derivation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secrecy::SecretString;

use crate::error::CryptoResult;
use crate::ids::ArchiveId;
use crate::kdf::derive_archive_key;
use crate::keys::ArchiveKey;
use crate::wallet::WalletKey;

type Slot = Arc<Mutex<Option<ArchiveKey>>>;

/// Thread-safe map of archive id → derived archive key. Never persisted.
#[derive(Default)]
pub struct KeyCache {
    slots: Mutex<HashMap<ArchiveId, Slot>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached key for `archive_id`, deriving it on first use.
    pub fn get_or_derive(
        &self,
        archive_id: &ArchiveId,
        wallet: &WalletKey,
        user_secret: &SecretString,
    ) -> CryptoResult<ArchiveKey> {
        self.get_or_try_insert_with(archive_id, || {
            derive_archive_key(wallet, archive_id, user_secret)
        })
    }

    /// Return the cached key for `archive_id`, or run `derive` to fill it.
    ///
    /// At most one caller runs `derive` for a given archive at a time; the
    /// others block on the slot and receive the stored key. A failed
    /// derivation caches nothing, so the next caller retries.
    pub fn get_or_try_insert_with<F>(
        &self,
        archive_id: &ArchiveId,
        derive: F,
    ) -> CryptoResult<ArchiveKey>
    where
        F: FnOnce() -> CryptoResult<ArchiveKey>,
    {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(*archive_id).or_default())
        };

        let mut entry = lock(&slot);
        if let Some(key) = entry.as_ref() {
            tracing::debug!(%archive_id, "archive key cache hit");
            return Ok(key.clone());
        }

        tracing::debug!(%archive_id, "archive key cache miss");
        match derive() {
            Ok(key) => {
                *entry = Some(key.clone());
                Ok(key)
            }
            Err(e) => {
                drop(entry);
                self.discard_empty_slot(archive_id, &slot);
                Err(e)
            }
        }
    }

    /// Remove `slot` after a failed derivation unless another caller holds it.
    ///
    /// Slot handles are only cloned under the map lock, so a count of two (the
    /// map plus ours) means no one is waiting to retry on it.
    fn discard_empty_slot(&self, archive_id: &ArchiveId, slot: &Slot) {
        let mut slots = lock(&self.slots);
        let unshared = slots
            .get(archive_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if unshared {
            slots.remove(archive_id);
        }
    }

    /// Cached key for `archive_id`, without deriving.
    ///
    /// Waits if a derivation for this archive is in flight.
    pub fn get(&self, archive_id: &ArchiveId) -> Option<ArchiveKey> {
        let slot = lock(&self.slots).get(archive_id).cloned()?;
        let entry = lock(&slot);
        entry.clone()
    }

    /// Number of archives with a derived key.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget one archive's key.
    pub fn remove(&self, archive_id: &ArchiveId) {
        let removed = lock(&self.slots).remove(archive_id);
        if let Some(slot) = removed {
            lock(&slot).take();
        }
    }

    /// Drop every cached key (logout).
    pub fn clear(&self) {
        let drained: Vec<Slot> = lock(&self.slots).drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            lock(&slot).take();
        }
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("slots", &lock(&self.slots).len())
            .finish()
    }
}

/// Cached keys are write-once, so a panic elsewhere cannot leave a slot half-updated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
