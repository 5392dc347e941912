//! Sealbox Transport - Certificate-pinned secure transport
//!
//! This crate provides:
//! - Transport sessions with an `Idle`/`Sending` state machine and abort
//! - Substitution of secure data descriptors with sealed blobs in JSON bodies
//! - PEM server key parsing for certificate pinning
//! - The [`HttpExecutor`] seam performing the actual HTTPS exchange

pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod pinning;
pub mod request;
pub mod transport;

pub use config::TransportConfig;
pub use descriptor::SecureDataDescriptor;
pub use error::{Result, TransportError};
pub use executor::{ExecutorError, HttpExecutor};
pub use pinning::{PinKind, ServerKeyPin};
pub use request::{HttpMethod, HttpRequest, OpenOptions, RequestFormat, Response, SendRequestOptions};
pub use transport::{SecureTransport, TransportId};
