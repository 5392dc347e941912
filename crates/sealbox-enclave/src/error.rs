//! Error types for the instance manager

use sealbox_core::{CoreError, Denial, ErrorCode, InstanceId, ToErrorObject};
use thiserror::Error;

use crate::oracle::OracleError;

/// Result type alias for enclave operations
pub type Result<T> = std::result::Result<T, EnclaveError>;

/// Errors that can occur in instance manager operations
#[derive(Debug, Error)]
pub enum EnclaveError {
    /// No live instance has this ID
    #[error("Secure data instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// Extra key or web owner reference is stale or unknown
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Plaintext access refused by policy
    #[error("Plaintext access denied by noRead policy on instance {0}")]
    NoReadPolicy(InstanceId),

    /// Sealed export refused by policy
    #[error("Sealed export denied by noStore policy on instance {0}")]
    NoStorePolicy(InstanceId),

    /// Access-control refusal from the policy engine
    #[error("Policy denied: {0}")]
    PolicyDenied(Denial),

    /// The sealed blob failed authentication or could not be decoded
    #[error("Unsealing failed - blob is corrupted, forged, or bound to another extra key")]
    UnsealFailed,

    /// The sealing oracle could not serve the request
    #[error("Sealing oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The sealing oracle did not answer within the configured timeout
    #[error("Sealing oracle timed out")]
    Timeout,

    /// Core validation error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Too many owners supplied
    #[error("Invalid number of owners: {0}")]
    InvalidNumberOfOwners(usize),

    /// Too many web owners supplied
    #[error("Invalid web domains list size: {0}")]
    InvalidWebDomainsListSize(usize),

    /// Data or tag size out of bounds
    #[error("Invalid input size: {0}")]
    InvalidInputSize(String),

    /// Cryptographic error inside the oracle
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal bookkeeping error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EnclaveError {
    /// Translate a policy engine refusal for `id`
    pub fn from_denial(id: InstanceId, denial: Denial) -> Self {
        match denial {
            Denial::NoRead => EnclaveError::NoReadPolicy(id),
            Denial::NoStore => EnclaveError::NoStorePolicy(id),
            other => EnclaveError::PolicyDenied(other),
        }
    }

    /// Whether the caller may retry the same call later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EnclaveError::OracleUnavailable(_) | EnclaveError::Timeout
        )
    }
}

impl ToErrorObject for EnclaveError {
    fn code(&self) -> ErrorCode {
        match self {
            EnclaveError::InstanceNotFound(_) => ErrorCode::InvalidHandle,
            EnclaveError::InvalidReference(_) => ErrorCode::InvalidIdentifier,
            EnclaveError::NoReadPolicy(_) | EnclaveError::NoStorePolicy(_) => {
                ErrorCode::PolicyViolation
            }
            EnclaveError::PolicyDenied(denial) => denial.code(),
            EnclaveError::UnsealFailed => ErrorCode::IntegrityViolation,
            EnclaveError::OracleUnavailable(_) | EnclaveError::Crypto(_) => ErrorCode::Crypto,
            EnclaveError::Timeout => ErrorCode::ConnectionTimeout,
            EnclaveError::Core(e) => e.code(),
            EnclaveError::InvalidNumberOfOwners(_) => ErrorCode::InvalidNumberOfOwners,
            EnclaveError::InvalidWebDomainsListSize(_) => ErrorCode::InvalidWebDomainsListSize,
            EnclaveError::InvalidInputSize(_) => ErrorCode::InvalidInputSize,
            EnclaveError::Io(_) => ErrorCode::FileSystemError,
            EnclaveError::Config(_)
            | EnclaveError::Serialization(_)
            | EnclaveError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<OracleError> for EnclaveError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::AuthenticationFailed | OracleError::Malformed(_) => {
                EnclaveError::UnsealFailed
            }
            OracleError::Unavailable(msg) => EnclaveError::OracleUnavailable(msg),
            OracleError::Crypto(msg) => EnclaveError::Crypto(msg),
        }
    }
}

impl From<serde_json::Error> for EnclaveError {
    fn from(e: serde_json::Error) -> Self {
        EnclaveError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes() {
        let id = InstanceId(3);
        let cases = [
            (EnclaveError::InstanceNotFound(id), 9),
            (EnclaveError::InvalidReference("extra key 4".into()), 3),
            (EnclaveError::NoReadPolicy(id), 13),
            (EnclaveError::NoStorePolicy(id), 13),
            (EnclaveError::UnsealFailed, 8),
            (EnclaveError::OracleUnavailable("down".into()), 1009),
            (EnclaveError::Timeout, 17),
            (EnclaveError::InvalidWebDomainsListSize(40), 14),
        ];
        for (err, code) in cases {
            assert_eq!(err.to_error_object().code, code, "{}", err);
        }
    }

    #[test]
    fn test_clearance_denial_reports_trust_level() {
        let err = EnclaveError::from_denial(
            InstanceId(1),
            Denial::InsufficientClearance {
                required: 3,
                presented: 1,
            },
        );
        assert_eq!(err.code(), ErrorCode::InsufficientTrustLevel);
    }

    #[test]
    fn test_oracle_errors_translate() {
        assert!(matches!(
            EnclaveError::from(OracleError::AuthenticationFailed),
            EnclaveError::UnsealFailed
        ));
        assert!(matches!(
            EnclaveError::from(OracleError::Malformed("short".into())),
            EnclaveError::UnsealFailed
        ));
        let unavailable = EnclaveError::from(OracleError::Unavailable("busy".into()));
        assert!(unavailable.is_transient());
        assert!(!EnclaveError::UnsealFailed.is_transient());
    }
}
