//! Creation options for secure data instances

use zeroize::Zeroizing;

use crate::metadata::InstanceMetadata;
use crate::policy::Policy;
use crate::types::{InstanceId, PrincipalId};

/// Options for creating an instance from plaintext
///
/// The plaintext is held in a zeroizing buffer and redacted from `Debug`.
#[derive(Clone)]
pub struct CreateOptions {
    /// Plaintext data
    pub data: Zeroizing<String>,
    /// Optional extra sealing secret, named by another live instance
    pub extra_key: Option<InstanceId>,
    /// Tag, policy and principals
    pub metadata: InstanceMetadata,
}

impl CreateOptions {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Zeroizing::new(data.into()),
            extra_key: None,
            metadata: InstanceMetadata::default(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tag = Some(tag.into());
        self
    }

    pub fn extra_key(mut self, extra_key: InstanceId) -> Self {
        self.extra_key = Some(extra_key);
        self
    }

    pub fn owners(mut self, owners: impl IntoIterator<Item = PrincipalId>) -> Self {
        self.metadata.owners = owners.into_iter().collect();
        self
    }

    pub fn creator(mut self, creator: PrincipalId) -> Self {
        self.metadata.creator = Some(creator);
        self
    }

    pub fn web_owners<S: Into<String>>(mut self, domains: impl IntoIterator<Item = S>) -> Self {
        self.metadata.web_owners = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.metadata.policy = policy;
        self
    }
}

impl std::fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateOptions")
            .field("data", &"[REDACTED]")
            .field("extra_key", &self.extra_key)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Options for creating an instance from a sealed blob
#[derive(Debug, Clone)]
pub struct SealedDataOptions {
    /// Sealed data as returned by a sealed export
    pub sealed_data: String,
    /// Extra sealing secret the blob was bound to, if any
    pub extra_key: Option<InstanceId>,
}

impl SealedDataOptions {
    pub fn new(sealed_data: impl Into<String>) -> Self {
        Self {
            sealed_data: sealed_data.into(),
            extra_key: None,
        }
    }

    pub fn extra_key(mut self, extra_key: InstanceId) -> Self {
        self.extra_key = Some(extra_key);
        self
    }
}
