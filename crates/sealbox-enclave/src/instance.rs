//! Live secure data instance state

use zeroize::{Zeroize, Zeroizing};

use sealbox_core::{InstanceId, InstanceMetadata};

/// One entry of the instance table
///
/// The plaintext is zeroized when the entry is wiped or dropped.
pub(crate) struct SecureDataInstance {
    /// Sensitive data, exclusively owned by the instance
    pub plaintext: Zeroizing<String>,

    /// Tag, policy and principals (immutable)
    pub metadata: InstanceMetadata,

    /// Weak reference to the instance supplying the extra key
    pub extra_key_ref: Option<InstanceId>,

    /// Cached sealed form under the current extra key
    pub sealed: Option<String>,

    /// Bumped on every re-key so stale seals are never published
    pub generation: u64,
}

impl SecureDataInstance {
    pub fn new(
        plaintext: Zeroizing<String>,
        metadata: InstanceMetadata,
        extra_key_ref: Option<InstanceId>,
    ) -> Self {
        Self {
            plaintext,
            metadata,
            extra_key_ref,
            sealed: None,
            generation: 0,
        }
    }

    /// Extra-key secret this instance contributes to other instances
    pub fn secret(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.plaintext.as_bytes().to_vec())
    }

    /// Make the plaintext unrecoverable and drop the cached seal
    pub fn wipe(&mut self) {
        self.plaintext.zeroize();
        self.sealed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wipe_clears_plaintext_and_cache() {
        let mut instance = SecureDataInstance::new(
            Zeroizing::new("secret".to_string()),
            InstanceMetadata::default(),
            None,
        );
        instance.sealed = Some("SBX1:...".to_string());

        instance.wipe();
        assert!(instance.plaintext.is_empty());
        assert!(instance.sealed.is_none());
    }
}
