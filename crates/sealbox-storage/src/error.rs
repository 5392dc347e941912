//! Error types for the storage adapter

use sealbox_core::{ErrorCode, ToErrorObject};
use sealbox_enclave::EnclaveError;
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage ID is malformed
    #[error("Invalid storage identifier: {0}")]
    InvalidIdentifier(String),

    /// Storage type is not supported
    #[error("Invalid storage type: {0}")]
    InvalidType(u32),

    /// Nothing is stored under this ID
    #[error("No sealed data stored under {0}")]
    NotFound(String),

    /// Sealed blob exceeds the configured limit
    #[error("Sealed blob is {size} bytes, limit is {limit}")]
    BlobTooLarge { size: usize, limit: usize },

    /// Error from the instance manager
    #[error(transparent)]
    Enclave(#[from] EnclaveError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ToErrorObject for StorageError {
    fn code(&self) -> ErrorCode {
        match self {
            StorageError::InvalidIdentifier(_) | StorageError::NotFound(_) => {
                ErrorCode::InvalidIdentifier
            }
            StorageError::InvalidType(_) => ErrorCode::InvalidType,
            StorageError::BlobTooLarge { .. } => ErrorCode::InvalidInputSize,
            StorageError::Enclave(e) => e.code(),
            StorageError::Io(_) => ErrorCode::FileSystemError,
            StorageError::Config(_) | StorageError::Serialization(_) => ErrorCode::InternalError,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealbox_core::InstanceId;

    #[test]
    fn test_storage_codes() {
        assert_eq!(
            StorageError::InvalidIdentifier("../x".into())
                .to_error_object()
                .code,
            3
        );
        assert_eq!(StorageError::NotFound("a".into()).to_error_object().code, 3);
        assert_eq!(StorageError::InvalidType(2).to_error_object().code, 10);
        assert_eq!(
            StorageError::Io(std::io::Error::other("disk gone"))
                .to_error_object()
                .code,
            1
        );
    }

    #[test]
    fn test_enclave_codes_pass_through() {
        let err = StorageError::from(EnclaveError::InstanceNotFound(InstanceId(8)));
        assert_eq!(err.to_error_object().code, 9);

        let err = StorageError::from(EnclaveError::NoStorePolicy(InstanceId(8)));
        assert_eq!(err.code(), ErrorCode::PolicyViolation);
    }
}
