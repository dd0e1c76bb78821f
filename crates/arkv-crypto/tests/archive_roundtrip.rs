//! End-to-end upload/download flow: session → tags → transport → session.
//!
//! The "transport" here is an in-memory list of (tags, body) records, which is
//! all the core ever hands to the real ledger client.

use std::sync::Arc;
use std::thread;

use arkv_crypto::{
    decrypt_metadata, encrypt_metadata, ArchiveId, CryptoError, FileId, RecordKind, RecordTags,
    Session, Tag, WalletKey,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

const WALLET_PEM: &str = include_str!("fixtures/wallet.pem");

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanMetadata {
    official_title: String,
    document_type: String,
    size: u64,
    file_id: FileId,
}

struct StoredRecord {
    tags: Vec<Tag>,
    body: Vec<u8>,
}

fn login() -> Session {
    Session::login(WalletKey::from_pem(WALLET_PEM).unwrap())
}

fn password() -> SecretString {
    SecretString::from("field-office-2024")
}

fn upload(session: &Session, archive_id: ArchiveId, name: &str, body: &[u8]) -> Vec<StoredRecord> {
    let file_id = FileId::new_v4();
    let file_key = session.file_key(&archive_id, &file_id, &password()).unwrap();

    let data = arkv_crypto::encrypt(&file_key, body).unwrap();
    let data_tags = RecordTags::data(&data, archive_id, file_id, name).to_tags();

    let meta = ScanMetadata {
        official_title: name.to_string(),
        document_type: "Passport".into(),
        size: body.len() as u64,
        file_id,
    };
    let meta_payload = encrypt_metadata(&file_key, &meta).unwrap();
    let meta_tags = RecordTags::metadata(&meta_payload, archive_id, file_id, "application/pdf").to_tags();

    vec![
        StoredRecord {
            tags: data_tags,
            body: data.into_data(),
        },
        StoredRecord {
            tags: meta_tags,
            body: meta_payload.into_data(),
        },
    ]
}

fn download(session: &Session, record: &StoredRecord) -> Result<Vec<u8>, CryptoError> {
    let tags = RecordTags::from_tags(&record.tags)?;
    let file_key = session.file_key(&tags.archive_id, &tags.file_id, &password())?;
    tags.decrypt(&file_key, &record.body)
}

#[test]
fn upload_then_download_in_a_new_session() {
    let archive_id = ArchiveId::new_v4();
    let body: Vec<u8> = (0..(2 * 1024 * 1024)).map(|i| (i % 253) as u8).collect();

    let records = {
        let session = login();
        let records = upload(&session, archive_id, "scan-001.pdf", &body);
        session.logout();
        records
    };

    let session = login();
    assert_eq!(download(&session, &records[0]).unwrap(), body);

    let meta_tags = RecordTags::from_tags(&records[1].tags).unwrap();
    assert_eq!(meta_tags.kind, RecordKind::Meta);
    let file_key = session
        .file_key(&meta_tags.archive_id, &meta_tags.file_id, &password())
        .unwrap();
    let meta: ScanMetadata =
        decrypt_metadata(&meta_tags.cipher_iv, &file_key, &records[1].body).unwrap();
    assert_eq!(meta.size, body.len() as u64);
    assert_eq!(meta.file_id, meta_tags.file_id);
}

#[test]
fn corrupted_body_is_rejected_not_returned() {
    let session = login();
    let mut records = upload(&session, ArchiveId::new_v4(), "scan.pdf", b"original bytes");

    let last = records[0].body.len() - 1;
    records[0].body[last] ^= 0x01;

    let err = download(&session, &records[0]).unwrap_err();
    assert!(err.is_integrity(), "{err:?}");
}

#[test]
fn swapped_nonce_tag_is_rejected() {
    let session = login();
    let archive_id = ArchiveId::new_v4();
    let a = upload(&session, archive_id, "a.pdf", b"first");
    let mut b = upload(&session, archive_id, "b.pdf", b"second");

    let nonce_a = a[0].tags.iter().find(|t| t.name == "cipherIV").unwrap().value.clone();
    for tag in b[0].tags.iter_mut().filter(|t| t.name == "cipherIV") {
        tag.value = nonce_a.clone();
    }

    assert!(download(&session, &b[0]).unwrap_err().is_integrity());
}

#[test]
fn other_wallet_cannot_decrypt() {
    let session = login();
    let records = upload(&session, ArchiveId::new_v4(), "scan.pdf", b"private");

    let other = Session::login(
        WalletKey::from_private_key(
            rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap(),
        )
        .unwrap(),
    );
    assert!(download(&other, &records[0]).unwrap_err().is_integrity());
}

#[test]
fn sessions_work_across_threads() {
    let session = Arc::new(login());
    let archive_id = ArchiveId::new_v4();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let body = format!("document {i}").into_bytes();
                let records = upload(&session, archive_id, "doc.pdf", &body);
                assert_eq!(download(&session, &records[0]).unwrap(), body);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(session.cached_archives(), 1);
}
