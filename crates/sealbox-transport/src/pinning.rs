//! Server key pinning
//!
//! A session may carry the server's public key or certificate in PEM form.
//! The executor must refuse any server that does not present it.

use sha2::{Digest, Sha256};

use crate::error::{Result, TransportError};

const PEM_TAG_PUBLIC_KEY: &str = "PUBLIC KEY";
const PEM_TAG_CERTIFICATE: &str = "CERTIFICATE";

/// What the pinned DER encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    /// SubjectPublicKeyInfo
    PublicKey,
    /// X.509 certificate
    Certificate,
}

/// Pinned server key, kept as DER
#[derive(Clone, PartialEq, Eq)]
pub struct ServerKeyPin {
    kind: PinKind,
    der: Vec<u8>,
}

impl ServerKeyPin {
    /// Parse a PEM `PUBLIC KEY` or `CERTIFICATE` block
    pub fn from_pem(input: &str) -> Result<Self> {
        let block = pem::parse(input.trim())
            .map_err(|e| TransportError::BadCertificateFormat(format!("Invalid PEM: {}", e)))?;

        let kind = match block.tag() {
            PEM_TAG_PUBLIC_KEY => PinKind::PublicKey,
            PEM_TAG_CERTIFICATE => PinKind::Certificate,
            other => {
                return Err(TransportError::BadCertificateFormat(format!(
                    "unsupported PEM block {:?}",
                    other
                )))
            }
        };

        if block.contents().is_empty() {
            return Err(TransportError::BadCertificateFormat(
                "empty PEM block".to_string(),
            ));
        }

        Ok(Self {
            kind,
            der: block.contents().to_vec(),
        })
    }

    pub fn kind(&self) -> PinKind {
        self.kind
    }

    /// DER bytes the server must present
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// SHA-256 of the DER bytes, hex encoded
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }

    /// Whether `presented` is the pinned key
    pub fn matches(&self, presented: &[u8]) -> bool {
        self.der == presented
    }
}

impl std::fmt::Debug for ServerKeyPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPin")
            .field("kind", &self.kind)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}
