//! HTTP executor seam
//!
//! The transport never opens sockets itself. An [`HttpExecutor`] performs the
//! TLS exchange, enforcing [`HttpRequest::pinned_key`] when one is set.

use async_trait::async_trait;
use thiserror::Error;

use crate::request::{HttpRequest, Response};

/// Failures reported by an executor
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// No response within the request timeout
    #[error("Request timed out")]
    Timeout,

    /// Host could not be resolved or reached
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// Server did not present the pinned key
    #[error("Pinned key mismatch: {0}")]
    PinMismatch(String),

    /// Response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other connection failure
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Trait for HTTPS client back ends
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Perform `request` and return the server's response
    async fn execute(&self, request: HttpRequest) -> Result<Response, ExecutorError>;

    /// Get the executor type name
    fn executor_type(&self) -> &'static str;
}
