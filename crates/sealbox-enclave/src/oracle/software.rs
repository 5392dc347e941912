//! Software sealing oracle
//!
//! Seals with ChaCha20-Poly1305 under a key derived from a 32-byte platform
//! key, a per-blob random salt and, when present, the extra key.
//!
//! # Blob Format
//!
//! `SBX1:` followed by the base64 encoding of:
//! - 1-byte format version
//! - 1-byte flags (bit 0: extra key bound)
//! - 16-byte salt
//! - 12-byte nonce
//! - ciphertext of the JSON payload, with the 16-byte authentication tag
//!
//! Version, flags and salt are passed as associated data, so every byte of the
//! blob is covered by the authentication tag.

use async_trait::async_trait;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use sealbox_core::InstanceMetadata;

use super::{OracleError, SealRequest, SealingOracle, UnsealedData};

/// Prefix of every blob produced by this oracle
pub const BLOB_PREFIX: &str = "SBX1:";

/// Blob format version
pub const BLOB_VERSION: u8 = 1;

/// Flag bit recording that an extra key was mixed into the sealing key
const FLAG_EXTRA_KEY: u8 = 0x01;

const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const AAD_SIZE: usize = 2 + SALT_SIZE;
const HEADER_SIZE: usize = AAD_SIZE + NONCE_SIZE;

/// Domain separator for sealing key derivation
const KEY_DOMAIN: &[u8] = b"sealbox/sealing-key/v1";

/// Payload encrypted inside a blob (borrowed form for sealing)
#[derive(Serialize)]
struct SealedPayloadRef<'a> {
    data: &'a str,
    metadata: &'a InstanceMetadata,
    sealed_at: DateTime<Utc>,
}

/// Payload recovered from a blob
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct SealedPayload {
    data: String,
    #[zeroize(skip)]
    metadata: InstanceMetadata,
    #[zeroize(skip)]
    sealed_at: DateTime<Utc>,
}

/// ChaCha20-Poly1305 sealing oracle keyed by a software platform key
pub struct SoftwareOracle {
    platform_key: Zeroizing<[u8; 32]>,
}

impl SoftwareOracle {
    /// Create an oracle with a fresh random platform key
    pub fn generate() -> Self {
        let mut platform_key = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *platform_key);
        Self { platform_key }
    }

    /// Create an oracle from an existing platform key
    pub fn from_platform_key(platform_key: [u8; 32]) -> Self {
        Self {
            platform_key: Zeroizing::new(platform_key),
        }
    }

    /// Seal synchronously
    pub fn seal_blob(&self, request: SealRequest<'_>) -> Result<String, OracleError> {
        let mut rng = rand::rngs::OsRng;

        let mut salt = [0u8; SALT_SIZE];
        rng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut nonce_bytes);

        let flags = if request.extra_key.is_some() {
            FLAG_EXTRA_KEY
        } else {
            0
        };

        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.push(BLOB_VERSION);
        header.push(flags);
        header.extend_from_slice(&salt);
        header.extend_from_slice(&nonce_bytes);

        let payload = SealedPayloadRef {
            data: request.plaintext,
            metadata: request.metadata,
            sealed_at: Utc::now(),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&payload).map_err(|e| OracleError::Crypto(e.to_string()))?,
        );

        let key = self.derive_key(&salt, request.extra_key);
        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| OracleError::Crypto(format!("Invalid key: {}", e)))?;

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: &header[..AAD_SIZE],
                },
            )
            .map_err(|e| OracleError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut blob = header;
        blob.extend_from_slice(&ciphertext);

        let encoded = base64::engine::general_purpose::STANDARD.encode(&blob);
        Ok(format!("{}{}", BLOB_PREFIX, encoded))
    }

    /// Unseal synchronously
    pub fn unseal_blob(
        &self,
        sealed: &str,
        extra_key: Option<&[u8]>,
    ) -> Result<UnsealedData, OracleError> {
        let encoded = sealed
            .strip_prefix(BLOB_PREFIX)
            .ok_or_else(|| OracleError::Malformed("missing blob prefix".to_string()))?;

        let blob = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| OracleError::Malformed(format!("base64 decode failed: {}", e)))?;

        if blob.len() < HEADER_SIZE + TAG_SIZE {
            return Err(OracleError::Malformed(format!(
                "blob too short: {} bytes",
                blob.len()
            )));
        }

        let version = blob[0];
        if version != BLOB_VERSION {
            return Err(OracleError::Malformed(format!(
                "unsupported version {}",
                version
            )));
        }

        let flags = blob[1];
        if flags & !FLAG_EXTRA_KEY != 0 {
            return Err(OracleError::Malformed(format!("unknown flags {:#04x}", flags)));
        }

        let bound = flags & FLAG_EXTRA_KEY != 0;
        if bound != extra_key.is_some() {
            return Err(OracleError::AuthenticationFailed);
        }

        let salt = &blob[2..AAD_SIZE];
        let nonce = Nonce::from_slice(&blob[AAD_SIZE..HEADER_SIZE]);
        let ciphertext = &blob[HEADER_SIZE..];

        let key = self.derive_key(salt, extra_key);
        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| OracleError::Crypto(format!("Invalid key: {}", e)))?;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    nonce,
                    Payload {
                        msg: ciphertext,
                        aad: &blob[..AAD_SIZE],
                    },
                )
                .map_err(|_| OracleError::AuthenticationFailed)?,
        );

        let mut payload: SealedPayload = serde_json::from_slice(&plaintext)
            .map_err(|e| OracleError::Malformed(format!("payload decode failed: {}", e)))?;

        Ok(UnsealedData {
            plaintext: Zeroizing::new(std::mem::take(&mut payload.data)),
            metadata: std::mem::take(&mut payload.metadata),
            sealed_at: payload.sealed_at,
        })
    }

    /// Derive the AEAD key for one blob
    fn derive_key(&self, salt: &[u8], extra_key: Option<&[u8]>) -> Zeroizing<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(&self.platform_key[..]);
        hasher.update(salt);
        if let Some(extra) = extra_key {
            hasher.update(Sha256::digest(extra));
        }
        Zeroizing::new(hasher.finalize().into())
    }
}

impl std::fmt::Debug for SoftwareOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftwareOracle([REDACTED])")
    }
}

#[async_trait]
impl SealingOracle for SoftwareOracle {
    async fn seal(&self, request: SealRequest<'_>) -> Result<String, OracleError> {
        self.seal_blob(request)
    }

    async fn unseal(
        &self,
        sealed: &str,
        extra_key: Option<&[u8]>,
    ) -> Result<UnsealedData, OracleError> {
        self.unseal_blob(sealed, extra_key)
    }

    fn oracle_type(&self) -> &'static str {
        "software"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealbox_core::{Policy, PrincipalId};

    fn test_oracle() -> SoftwareOracle {
        SoftwareOracle::from_platform_key([42u8; 32])
    }

    fn test_metadata() -> InstanceMetadata {
        InstanceMetadata {
            tag: Some("t1".to_string()),
            policy: Policy::new().with_sensitivity_level(2),
            creator: Some(PrincipalId(10)),
            owners: vec![PrincipalId(11), PrincipalId(12)],
            web_owners: vec!["bank.example".to_string()],
        }
    }

    fn request<'a>(
        plaintext: &'a str,
        metadata: &'a InstanceMetadata,
        extra_key: Option<&'a [u8]>,
    ) -> SealRequest<'a> {
        SealRequest {
            plaintext,
            metadata,
            extra_key,
        }
    }

    #[test]
    fn test_seal_unseal_round_trip() {
        let oracle = test_oracle();
        let metadata = test_metadata();

        let blob = oracle
            .seal_blob(request("secret-42", &metadata, None))
            .unwrap();
        assert!(blob.starts_with(BLOB_PREFIX));
        assert!(!blob.contains("secret-42"));

        let unsealed = oracle.unseal_blob(&blob, None).unwrap();
        assert_eq!(unsealed.plaintext.as_str(), "secret-42");
        assert_eq!(unsealed.metadata, metadata);
    }

    #[test]
    fn test_extra_key_round_trip() {
        let oracle = test_oracle();
        let metadata = test_metadata();
        let extra = b"extra-secret".as_slice();

        let blob = oracle
            .seal_blob(request("payload", &metadata, Some(extra)))
            .unwrap();
        let unsealed = oracle.unseal_blob(&blob, Some(extra)).unwrap();
        assert_eq!(unsealed.plaintext.as_str(), "payload");
    }

    #[test]
    fn test_extra_key_is_bound() {
        let oracle = test_oracle();
        let metadata = test_metadata();

        let bound = oracle
            .seal_blob(request("payload", &metadata, Some(b"right".as_slice())))
            .unwrap();
        assert_eq!(
            oracle.unseal_blob(&bound, Some(b"wrong".as_slice())).unwrap_err(),
            OracleError::AuthenticationFailed
        );
        assert_eq!(
            oracle.unseal_blob(&bound, None).unwrap_err(),
            OracleError::AuthenticationFailed
        );

        let unbound = oracle.seal_blob(request("payload", &metadata, None)).unwrap();
        assert_eq!(
            oracle.unseal_blob(&unbound, Some(b"right".as_slice())).unwrap_err(),
            OracleError::AuthenticationFailed
        );
    }

    #[test]
    fn test_other_platform_key_fails() {
        let metadata = test_metadata();
        let blob = test_oracle()
            .seal_blob(request("payload", &metadata, None))
            .unwrap();

        let other = SoftwareOracle::from_platform_key([7u8; 32]);
        assert_eq!(
            other.unseal_blob(&blob, None).unwrap_err(),
            OracleError::AuthenticationFailed
        );
    }

    #[test]
    fn test_every_byte_is_authenticated() {
        let oracle = test_oracle();
        let metadata = test_metadata();
        let blob = oracle.seal_blob(request("abc", &metadata, None)).unwrap();

        let raw = base64::engine::general_purpose::STANDARD
            .decode(blob.strip_prefix(BLOB_PREFIX).unwrap())
            .unwrap();

        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let encoded = format!(
                "{}{}",
                BLOB_PREFIX,
                base64::engine::general_purpose::STANDARD.encode(&tampered)
            );
            assert!(
                oracle.unseal_blob(&encoded, None).is_err(),
                "byte {} flip went undetected",
                i
            );
        }
    }

    #[test]
    fn test_malformed_inputs() {
        let oracle = test_oracle();
        assert!(matches!(
            oracle.unseal_blob("not a blob", None),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            oracle.unseal_blob("SBX1:!!!", None),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            oracle.unseal_blob("SBX1:AAAA", None),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_blobs_are_randomized() {
        let oracle = test_oracle();
        let metadata = test_metadata();
        let a = oracle.seal_blob(request("same", &metadata, None)).unwrap();
        let b = oracle.seal_blob(request("same", &metadata, None)).unwrap();
        assert_ne!(a, b);
    }
}
