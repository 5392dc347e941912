//! Sealbox Core - Shared types, access policy, and error codes
//!
//! This crate provides the foundational types for the Sealbox secure data
//! system: instance and principal identifiers, the access policy attached to
//! every secure data instance, the pure policy engine that gates plaintext and
//! sealed exports, and the numeric error table surfaced at every boundary.

pub mod error;
pub mod metadata;
pub mod options;
pub mod policy;
pub mod types;

pub use error::{CoreError, ErrorCode, ErrorObject, Result, ToErrorObject};
pub use metadata::InstanceMetadata;
pub use options::{CreateOptions, SealedDataOptions};
pub use policy::{AccessContext, Denial, Operation, Policy, Principals};
pub use types::{InstanceId, PrincipalId};

/// Maximum accepted length of a trusted web domain
pub const MAX_WEB_DOMAIN_LENGTH: usize = 253;
