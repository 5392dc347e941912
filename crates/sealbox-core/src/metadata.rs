//! Immutable metadata of a secure data instance
//!
//! The metadata travels inside every sealed blob so that an instance restored
//! from sealed data carries the same tag, policy and principals as the one it
//! was exported from.

use serde::{Deserialize, Serialize};

use crate::policy::{Policy, Principals};
use crate::types::PrincipalId;

/// Tag, policy and principals fixed at creation time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetadata {
    /// Free-text label
    pub tag: Option<String>,

    /// Access-control attributes
    pub policy: Policy,

    /// Principal that created the instance
    pub creator: Option<PrincipalId>,

    /// Principals with elevated rights
    pub owners: Vec<PrincipalId>,

    /// Trusted domains allowed to receive sealed descriptors
    pub web_owners: Vec<String>,
}

impl InstanceMetadata {
    /// Principals view used by the policy engine
    pub fn principals(&self) -> Principals<'_> {
        Principals {
            creator: self.creator,
            owners: &self.owners,
        }
    }

    /// Whether `domain` may receive sealed descriptors of this instance
    pub fn trusts_domain(&self, domain: &str) -> bool {
        self.web_owners.iter().any(|owner| owner == domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusts_domain_is_exact_match() {
        let metadata = InstanceMetadata {
            web_owners: vec!["bank.example".to_string()],
            ..Default::default()
        };
        assert!(metadata.trusts_domain("bank.example"));
        assert!(!metadata.trusts_domain("evil.bank.example"));
        assert!(!metadata.trusts_domain("example"));
    }
}
