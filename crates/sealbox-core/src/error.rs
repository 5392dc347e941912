//! Error types and the boundary error table
//!
//! Every failure that leaves a Sealbox crate is reported as an [`ErrorObject`]
//! carrying one of the numeric [`ErrorCode`]s below. The values match the
//! security services error list so that host bindings can forward them as-is.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Numeric error codes reported at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    FileSystemError = 1,
    InsufficientMemory = 2,
    InvalidIdentifier = 3,
    InvalidNumberOfOwners = 4,
    InvalidPersona = 5,
    InvalidPolicy = 6,
    InvalidInputSize = 7,
    IntegrityViolation = 8,
    InvalidHandle = 9,
    InvalidType = 10,
    StorageIdentifierInUse = 11,
    PolicyViolation = 13,
    InvalidWebDomainsListSize = 14,
    ServerNotAccessible = 16,
    ConnectionTimeout = 17,
    ConnectionGeneric = 18,
    InvalidDescriptorStructure = 19,
    InvalidDescriptorPath = 20,
    InvalidTimeout = 22,
    DescriptorNotSupportedForRequestFormat = 23,
    InvalidRequestFormat = 24,
    InvalidRequestBodyStructure = 26,
    InvalidResponseBodyStructure = 27,
    InvalidUrl = 29,
    InvalidHttpMethod = 30,
    BadCertificateFormat = 32,
    ServerAuthenticationError = 33,
    InvalidArgumentSize = 34,
    IncorrectState = 35,
    ActionAborted = 36,
    InternalError = 1000,
    NotImplemented = 1003,
    InsufficientTrustLevel = 1005,
    Crypto = 1009,
}

impl ErrorCode {
    /// The wire value of this code
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.as_i32())
    }
}

/// Error shape handed to callers: `{code, message}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
}

impl ErrorObject {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i32(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Conversion of a crate error into its boundary form
pub trait ToErrorObject: std::fmt::Display {
    /// Numeric code for this error
    fn code(&self) -> ErrorCode;

    /// Build the `{code, message}` object
    fn to_error_object(&self) -> ErrorObject {
        ErrorObject::new(self.code(), self.to_string())
    }
}

/// Validation errors raised by core types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid web domain: {0}")]
    InvalidWebDomain(String),
}

impl ToErrorObject for CoreError {
    fn code(&self) -> ErrorCode {
        match self {
            CoreError::InvalidPolicy(_) => ErrorCode::InvalidPolicy,
            CoreError::InvalidWebDomain(_) => ErrorCode::InvalidIdentifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_wire_values() {
        assert_eq!(ErrorCode::InvalidHandle.as_i32(), 9);
        assert_eq!(ErrorCode::IntegrityViolation.as_i32(), 8);
        assert_eq!(ErrorCode::PolicyViolation.as_i32(), 13);
        assert_eq!(ErrorCode::Crypto.as_i32(), 1009);
    }

    #[test]
    fn test_error_object_serializes_as_code_and_message() {
        let err = CoreError::InvalidPolicy("sensitivity level 900 out of range".to_string());
        let obj = err.to_error_object();
        assert_eq!(obj.code, 6);

        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["code"], 6);
        assert!(json["message"].as_str().unwrap().contains("900"));
    }
}
