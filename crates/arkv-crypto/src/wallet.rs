//! Wallet key loading and the unsalted RSA-PSS signature oracle
//!
//! The wallet key never encrypts anything itself. It only signs a
//! domain-tagged message whose signature seeds the archive key, so the
//! signature must be deterministic: PSS with a zero-length salt.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// PSS salt length. Zero makes the signature a pure function of (key, message).
const PSS_SALT_LEN: usize = 0;

/// An RSA wallet private key held for the lifetime of a session.
#[derive(Clone)]
pub struct WalletKey {
    key: RsaPrivateKey,
}

/// Ledger wallet in JSON Web Key form. Only the fields needed to rebuild
/// the private key are read; CRT parameters are recomputed.
#[derive(Deserialize)]
struct RsaJwk {
    kty: String,
    n: String,
    e: String,
    d: Option<String>,
    p: Option<String>,
    q: Option<String>,
}

impl WalletKey {
    pub fn from_private_key(key: RsaPrivateKey) -> CryptoResult<Self> {
        key.validate()
            .map_err(|e| CryptoError::InvalidKey(format!("RSA key failed validation: {e}")))?;
        Ok(Self { key })
    }

    /// Parse a wallet from either JWK JSON or PEM text.
    pub fn parse(text: &str) -> CryptoResult<Self> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') {
            Self::from_jwk_json(trimmed)
        } else if trimmed.starts_with("-----BEGIN") {
            Self::from_pem(trimmed)
        } else {
            Err(CryptoError::InvalidKey(
                "unrecognised wallet format (expected JWK JSON or PEM)".into(),
            ))
        }
    }

    /// Load a JWK wallet (`kty = "RSA"`, base64url big-endian components).
    pub fn from_jwk_json(json: &str) -> CryptoResult<Self> {
        let jwk: RsaJwk = serde_json::from_str(json)
            .map_err(|e| CryptoError::InvalidKey(format!("wallet is not a JWK: {e}")))?;

        if jwk.kty != "RSA" {
            return Err(CryptoError::InvalidKey(format!(
                "unsupported key type {:?} (expected \"RSA\")",
                jwk.kty
            )));
        }

        let (d, p, q) = match (&jwk.d, &jwk.p, &jwk.q) {
            (Some(d), Some(p), Some(q)) => (d, p, q),
            (None, _, _) => {
                return Err(CryptoError::InvalidKey(
                    "JWK has no private exponent: a public key cannot sign".into(),
                ))
            }
            _ => {
                return Err(CryptoError::InvalidKey(
                    "JWK is missing prime factors p/q".into(),
                ))
            }
        };

        let key = RsaPrivateKey::from_components(
            jwk_uint("n", &jwk.n)?,
            jwk_uint("e", &jwk.e)?,
            jwk_uint("d", d)?,
            vec![jwk_uint("p", p)?, jwk_uint("q", q)?],
        )
        .map_err(|e| CryptoError::InvalidKey(format!("inconsistent RSA components: {e}")))?;

        Self::from_private_key(key)
    }

    /// Load a PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM wallet.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let key = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| CryptoError::InvalidKey(format!("PKCS#1 PEM: {e}")))?
        } else if pem.contains("BEGIN PRIVATE KEY") {
            RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| CryptoError::InvalidKey(format!("PKCS#8 PEM: {e}")))?
        } else if pem.contains("PUBLIC KEY") {
            return Err(CryptoError::InvalidKey(
                "PEM holds a public key: a public key cannot sign".into(),
            ));
        } else {
            return Err(CryptoError::InvalidKey(
                "unsupported PEM block (expected PRIVATE KEY or RSA PRIVATE KEY)".into(),
            ));
        };
        Self::from_private_key(key)
    }

    /// Sign `message` with RSA-PSS over SHA-256 and a zero-length salt.
    ///
    /// Deterministic: the same key and message always produce the same
    /// signature, `modulus_len()` bytes long.
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        let signer = BlindedSigningKey::<Sha256>::new_with_salt_len(self.key.clone(), PSS_SALT_LEN);
        let signature = signer
            .try_sign_with_rng(&mut OsRng, message)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Modulus size in bytes (and therefore signature length).
    pub fn modulus_len(&self) -> usize {
        self.key.size()
    }

    /// Ledger address: base64url(SHA-256(modulus)), unpadded.
    pub fn address(&self) -> String {
        let digest = Sha256::digest(self.key.n().to_bytes_be());
        B64URL.encode(digest)
    }
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("address", &self.address())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn jwk_uint(field: &str, value: &str) -> CryptoResult<BigUint> {
    let bytes = B64URL
        .decode(value.trim_end_matches('='))
        .map_err(|e| CryptoError::InvalidKey(format!("JWK field {field:?} is not base64url: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::Pss;

    const WALLET_PEM: &str = include_str!("../tests/fixtures/wallet.pem");
    const WALLET_JWK: &str = include_str!("../tests/fixtures/wallet.json");

    fn wallet() -> WalletKey {
        WalletKey::from_pem(WALLET_PEM).unwrap()
    }

    #[test]
    fn signature_is_deterministic() {
        let w = wallet();
        let s1 = w.sign(b"drive-and-some-id").unwrap();
        let s2 = w.sign(b"drive-and-some-id").unwrap();
        assert_eq!(s1, s2, "zero-salt PSS must be deterministic");
        assert_eq!(s1.len(), w.modulus_len());
        assert_eq!(w.modulus_len(), 256);
    }

    #[test]
    fn different_messages_different_signatures() {
        let w = wallet();
        assert_ne!(w.sign(b"drive-a").unwrap(), w.sign(b"drive-b").unwrap());
    }

    #[test]
    fn signature_verifies_as_pss_sha256() {
        let w = wallet();
        let message = b"drive\x11\x11\x11\x11";
        let signature = w.sign(message).unwrap();
        let digest = Sha256::digest(message);

        w.key
            .to_public_key()
            .verify(Pss::new_with_salt::<Sha256>(0), &digest, &signature)
            .expect("signature must verify under PSS/SHA-256, salt 0");
    }

    #[test]
    fn jwk_and_pem_are_the_same_wallet() {
        let from_pem = wallet();
        let from_jwk = WalletKey::from_jwk_json(WALLET_JWK).unwrap();

        assert_eq!(from_pem.address(), from_jwk.address());
        assert_eq!(
            from_pem.sign(b"same message").unwrap(),
            from_jwk.sign(b"same message").unwrap()
        );
    }

    #[test]
    fn parse_detects_format() {
        assert!(WalletKey::parse(WALLET_JWK).is_ok());
        assert!(WalletKey::parse(WALLET_PEM).is_ok());
        assert!(matches!(
            WalletKey::parse("not a key"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn public_only_jwk_is_rejected() {
        let mut jwk: serde_json::Value = serde_json::from_str(WALLET_JWK).unwrap();
        let obj = jwk.as_object_mut().unwrap();
        for field in ["d", "p", "q", "dp", "dq", "qi"] {
            obj.remove(field);
        }
        let err = WalletKey::from_jwk_json(&jwk.to_string()).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)), "{err:?}");
    }

    #[test]
    fn public_pem_is_rejected() {
        let public_pem = wallet()
            .key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let err = WalletKey::from_pem(&public_pem).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)), "{err:?}");
    }

    #[test]
    fn non_rsa_jwk_is_rejected() {
        let jwk = r#"{"kty":"EC","n":"AQAB","e":"AQAB"}"#;
        assert!(matches!(
            WalletKey::from_jwk_json(jwk),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn corrupted_modulus_is_rejected() {
        let mut jwk: serde_json::Value = serde_json::from_str(WALLET_JWK).unwrap();
        jwk["n"] = serde_json::Value::String("AQAB".into());
        assert!(matches!(
            WalletKey::from_jwk_json(&jwk.to_string()),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn address_is_base64url_sha256() {
        let address = wallet().address();
        // 32-byte digest, unpadded base64url
        assert_eq!(address.len(), 43);
        assert!(!address.contains('='));
        assert!(!address.contains('+') && !address.contains('/'));
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", wallet());
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("BigUint"));
    }
}
