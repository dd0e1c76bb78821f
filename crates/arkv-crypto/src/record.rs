//! Ledger record tags
//!
//! Each encrypted upload is a record carrying plaintext tags. The archive
//! and file ids must stay readable so the keys can be re-derived; the nonce
//! and cipher id travel alongside them.
//!
//! Data record:     cipher, cipherIV, File-Name, File-Id, Archive-Id, Unix-Time, Transaction-Type
//! Metadata record: cipher, cipherIV, File-Type, File-Id, Archive-Id, Unix-Time, Transaction-Type

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cipher::{self, CipherKind, EncryptedPayload};
use crate::error::{CryptoError, CryptoResult};
use crate::ids::{ArchiveId, FileId};
use crate::keys::FileKey;

pub const TAG_CIPHER: &str = "cipher";
pub const TAG_CIPHER_IV: &str = "cipherIV";
pub const TAG_FILE_NAME: &str = "File-Name";
pub const TAG_FILE_TYPE: &str = "File-Type";
pub const TAG_FILE_ID: &str = "File-Id";
pub const TAG_ARCHIVE_ID: &str = "Archive-Id";
pub const TAG_UNIX_TIME: &str = "Unix-Time";
pub const TAG_TRANSACTION_TYPE: &str = "Transaction-Type";

/// One name/value tag as the transport stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Encrypted file contents
    Data,
    /// Encrypted JSON metadata describing a data record
    Meta,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Data => "DataTransaction",
            RecordKind::Meta => "MetaTransaction",
        }
    }

    fn parse(value: &str) -> CryptoResult<Self> {
        match value {
            "DataTransaction" => Ok(RecordKind::Data),
            "MetaTransaction" => Ok(RecordKind::Meta),
            other => Err(CryptoError::Record(format!("unknown transaction type {other:?}"))),
        }
    }
}

/// The typed view of a record's tag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTags {
    pub kind: RecordKind,
    pub cipher: CipherKind,
    pub cipher_iv: String,
    pub archive_id: ArchiveId,
    pub file_id: FileId,
    /// Milliseconds since the Unix epoch
    pub unix_time_ms: u64,
    /// `File-Name` on data records, `File-Type` on metadata records
    pub label: String,
}

impl RecordTags {
    /// Tags for an encrypted file body.
    pub fn data(
        payload: &EncryptedPayload,
        archive_id: ArchiveId,
        file_id: FileId,
        file_name: impl Into<String>,
    ) -> Self {
        Self::new(RecordKind::Data, payload, archive_id, file_id, file_name.into())
    }

    /// Tags for an encrypted metadata record describing `file_id`.
    pub fn metadata(
        payload: &EncryptedPayload,
        archive_id: ArchiveId,
        file_id: FileId,
        file_type: impl Into<String>,
    ) -> Self {
        Self::new(RecordKind::Meta, payload, archive_id, file_id, file_type.into())
    }

    fn new(
        kind: RecordKind,
        payload: &EncryptedPayload,
        archive_id: ArchiveId,
        file_id: FileId,
        label: String,
    ) -> Self {
        Self {
            kind,
            cipher: payload.cipher(),
            cipher_iv: payload.cipher_iv().to_string(),
            archive_id,
            file_id,
            unix_time_ms: unix_time_ms(),
            label,
        }
    }

    /// Flatten into the transport's ordered tag list.
    pub fn to_tags(&self) -> Vec<Tag> {
        let label_name = match self.kind {
            RecordKind::Data => TAG_FILE_NAME,
            RecordKind::Meta => TAG_FILE_TYPE,
        };
        vec![
            Tag::new(TAG_CIPHER, self.cipher.as_str()),
            Tag::new(TAG_CIPHER_IV, self.cipher_iv.clone()),
            Tag::new(label_name, self.label.clone()),
            Tag::new(TAG_FILE_ID, self.file_id.to_string()),
            Tag::new(TAG_ARCHIVE_ID, self.archive_id.to_string()),
            Tag::new(TAG_UNIX_TIME, self.unix_time_ms.to_string()),
            Tag::new(TAG_TRANSACTION_TYPE, self.kind.as_str()),
        ]
    }

    /// Parse a tag set fetched from the transport. Unknown tags are ignored;
    /// the first occurrence of a repeated tag wins.
    pub fn from_tags(tags: &[Tag]) -> CryptoResult<Self> {
        let find = |name: &str| tags.iter().find(|t| t.name == name).map(|t| t.value.as_str());
        let require = |name: &str| {
            find(name).ok_or_else(|| CryptoError::Record(format!("missing {name:?} tag")))
        };

        let kind = RecordKind::parse(require(TAG_TRANSACTION_TYPE)?)?;
        let label_name = match kind {
            RecordKind::Data => TAG_FILE_NAME,
            RecordKind::Meta => TAG_FILE_TYPE,
        };
        let unix_time_ms = match find(TAG_UNIX_TIME) {
            Some(v) => v
                .parse()
                .map_err(|e| CryptoError::Record(format!("bad Unix-Time {v:?}: {e}")))?,
            None => 0,
        };

        Ok(Self {
            kind,
            cipher: require(TAG_CIPHER)?.parse()?,
            cipher_iv: require(TAG_CIPHER_IV)?.to_string(),
            archive_id: require(TAG_ARCHIVE_ID)?.parse()?,
            file_id: require(TAG_FILE_ID)?.parse()?,
            unix_time_ms,
            label: find(label_name).unwrap_or_default().to_string(),
        })
    }

    /// Decrypt the record body this tag set describes.
    pub fn decrypt(&self, file_key: &FileKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        match self.cipher {
            CipherKind::Aes256Gcm => cipher::decrypt(&self.cipher_iv, file_key, data),
        }
    }
}

fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
