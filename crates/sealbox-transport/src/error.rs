//! Error types for the secure transport

use sealbox_core::{ErrorCode, InstanceId, ToErrorObject};
use sealbox_enclave::EnclaveError;
use thiserror::Error;

use crate::executor::ExecutorError;
use crate::TransportId;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// No open transport session has this ID
    #[error("Transport session not found: {0}")]
    InvalidHandle(TransportId),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidHttpMethod(String),

    #[error("Invalid timeout: {0} ms")]
    InvalidTimeout(u64),

    /// Server key is not a PEM public key or certificate
    #[error("Bad certificate format: {0}")]
    BadCertificateFormat(String),

    #[error("Invalid request format: {0}")]
    InvalidRequestFormat(String),

    /// Header list too long or header not representable
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Descriptors supplied with a non-JSON request body
    #[error("Secure data descriptors require the JSON request format")]
    DescriptorNotSupported,

    #[error("Invalid descriptor structure: {0}")]
    InvalidDescriptorStructure(String),

    #[error("Invalid descriptor path: {0}")]
    InvalidDescriptorPath(String),

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("Invalid response body: {0}")]
    InvalidResponseBody(String),

    /// Descriptor instance does not list the destination host as a web owner
    #[error("Instance {instance} does not trust host {host}")]
    UntrustedDomain { instance: InstanceId, host: String },

    /// Operation not allowed in the session's current state
    #[error("Incorrect state: {0}")]
    IncorrectState(String),

    /// Pending request was cancelled by abort or destroy
    #[error("Request aborted")]
    ActionAborted,

    #[error("Connection timed out")]
    ConnectionTimeout,

    #[error("Server not accessible: {0}")]
    ServerNotAccessible(String),

    /// Pinned key did not match the server
    #[error("Server authentication failed: {0}")]
    ServerAuthentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

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

impl ToErrorObject for TransportError {
    fn code(&self) -> ErrorCode {
        match self {
            TransportError::InvalidHandle(_) => ErrorCode::InvalidHandle,
            TransportError::InvalidUrl(_) => ErrorCode::InvalidUrl,
            TransportError::InvalidHttpMethod(_) => ErrorCode::InvalidHttpMethod,
            TransportError::InvalidTimeout(_) => ErrorCode::InvalidTimeout,
            TransportError::BadCertificateFormat(_) => ErrorCode::BadCertificateFormat,
            TransportError::InvalidRequestFormat(_) => ErrorCode::InvalidRequestFormat,
            TransportError::InvalidHeader(_) => ErrorCode::InvalidArgumentSize,
            TransportError::DescriptorNotSupported => {
                ErrorCode::DescriptorNotSupportedForRequestFormat
            }
            TransportError::InvalidDescriptorStructure(_) => ErrorCode::InvalidDescriptorStructure,
            TransportError::InvalidDescriptorPath(_) => ErrorCode::InvalidDescriptorPath,
            TransportError::InvalidRequestBody(_) => ErrorCode::InvalidRequestBodyStructure,
            TransportError::InvalidResponseBody(_) => ErrorCode::InvalidResponseBodyStructure,
            TransportError::UntrustedDomain { .. } => ErrorCode::InvalidIdentifier,
            TransportError::IncorrectState(_) => ErrorCode::IncorrectState,
            TransportError::ActionAborted => ErrorCode::ActionAborted,
            TransportError::ConnectionTimeout => ErrorCode::ConnectionTimeout,
            TransportError::ServerNotAccessible(_) => ErrorCode::ServerNotAccessible,
            TransportError::ServerAuthentication(_) => ErrorCode::ServerAuthenticationError,
            TransportError::Connection(_) => ErrorCode::ConnectionGeneric,
            TransportError::Enclave(e) => e.code(),
            TransportError::Io(_) => ErrorCode::FileSystemError,
            TransportError::Config(_) | TransportError::Serialization(_) => {
                ErrorCode::InternalError
            }
        }
    }
}

impl From<ExecutorError> for TransportError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Timeout => TransportError::ConnectionTimeout,
            ExecutorError::Unreachable(msg) => TransportError::ServerNotAccessible(msg),
            ExecutorError::PinMismatch(msg) => TransportError::ServerAuthentication(msg),
            ExecutorError::InvalidResponse(msg) => TransportError::InvalidResponseBody(msg),
            ExecutorError::Connection(msg) => TransportError::Connection(msg),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Serialization(e.to_string())
    }
}
