//! Sealing oracle abstraction
//!
//! The oracle is the platform's sealing primitive: it binds plaintext and
//! instance metadata into an opaque authenticated blob under a hardware-rooted
//! key, optionally mixed with an extra caller-supplied secret, and reverses
//! the process.
//!
//! # Contract
//!
//! - Blobs are tamper-evident: any modification makes `unseal` fail with
//!   [`OracleError::AuthenticationFailed`] or [`OracleError::Malformed`].
//! - The extra key is bound cryptographically. A blob sealed with an extra key
//!   does not unseal without it, and a blob sealed without one does not unseal
//!   when one is supplied.
//! - Metadata round-trips losslessly.

pub mod software;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sealbox_core::InstanceMetadata;
use thiserror::Error;
use zeroize::Zeroizing;

/// Input to a seal operation
#[derive(Clone, Copy)]
pub struct SealRequest<'a> {
    /// Plaintext to seal
    pub plaintext: &'a str,
    /// Metadata embedded alongside the plaintext
    pub metadata: &'a InstanceMetadata,
    /// Extra secret mixed into the sealing key
    pub extra_key: Option<&'a [u8]>,
}

impl std::fmt::Debug for SealRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealRequest")
            .field("plaintext", &"[REDACTED]")
            .field("metadata", self.metadata)
            .field("extra_key", &self.extra_key.map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Output of a successful unseal operation
pub struct UnsealedData {
    /// Recovered plaintext
    pub plaintext: Zeroizing<String>,
    /// Metadata embedded at sealing time
    pub metadata: InstanceMetadata,
    /// When the blob was produced
    pub sealed_at: DateTime<Utc>,
}

impl std::fmt::Debug for UnsealedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsealedData")
            .field("plaintext", &"[REDACTED]")
            .field("metadata", &self.metadata)
            .field("sealed_at", &self.sealed_at)
            .finish()
    }
}

/// Failures reported by a sealing oracle
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Authentication tag did not verify
    #[error("Sealed blob failed authentication")]
    AuthenticationFailed,

    /// Blob framing could not be decoded
    #[error("Malformed sealed blob: {0}")]
    Malformed(String),

    /// Oracle temporarily unable to serve requests
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    /// Unexpected failure inside the primitive
    #[error("Crypto error: {0}")]
    Crypto(String),
}

/// Trait for platform sealing primitives
#[async_trait]
pub trait SealingOracle: Send + Sync {
    /// Seal plaintext and metadata into an opaque blob
    async fn seal(&self, request: SealRequest<'_>) -> Result<String, OracleError>;

    /// Authenticate and open a blob produced by [`SealingOracle::seal`]
    async fn unseal(
        &self,
        sealed: &str,
        extra_key: Option<&[u8]>,
    ) -> Result<UnsealedData, OracleError>;

    /// Get the oracle type name
    fn oracle_type(&self) -> &'static str;
}
