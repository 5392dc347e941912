//! Secure data descriptors
//!
//! A descriptor names a secure data instance and a JSON pointer into the
//! request body. Before sending, the node at that pointer is replaced by the
//! instance's sealed form, so the body carries sealed blobs and never the
//! plaintext of the referenced instances.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use sealbox_core::InstanceId;
use sealbox_enclave::InstanceManager;

use crate::error::{Result, TransportError};

/// Reference from a request body node to a secure data instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecureDataDescriptor {
    #[serde(rename = "instanceID")]
    pub instance_id: InstanceId,
    /// JSON pointer to the node to replace
    pub path: String,
}

impl SecureDataDescriptor {
    pub fn new(instance_id: InstanceId, path: impl Into<String>) -> Self {
        Self {
            instance_id,
            path: path.into(),
        }
    }

    /// Decode the loose descriptor array a host hands over
    pub fn parse_list(value: &Value) -> Result<Vec<Self>> {
        let items = value.as_array().ok_or_else(|| {
            TransportError::InvalidDescriptorStructure("descriptors must be an array".to_string())
        })?;

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let descriptor: Self = serde_json::from_value(item.clone()).map_err(|e| {
                    TransportError::InvalidDescriptorStructure(format!("descriptor {}: {}", i, e))
                })?;
                descriptor.check_path()?;
                Ok(descriptor)
            })
            .collect()
    }

    /// Check the pointer syntax, independent of any body
    pub fn check_path(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(TransportError::InvalidDescriptorPath(format!(
                "{:?} is not a JSON pointer to a child node",
                self.path
            )));
        }
        Ok(())
    }
}

/// Replace the node at `path` in `document` with the string `sealed`
///
/// The node must already exist.
pub fn substitute(document: &mut Value, path: &str, sealed: &str) -> Result<()> {
    let node = document
        .pointer_mut(path)
        .ok_or_else(|| TransportError::InvalidDescriptorPath(format!("{:?} not found", path)))?;
    *node = Value::String(sealed.to_string());
    Ok(())
}

/// Substitute every descriptor in a JSON `body` bound for `host`
///
/// Each referenced instance must list `host` among its web owners and must
/// allow sealed export.
pub async fn apply_descriptors(
    manager: &InstanceManager,
    host: &str,
    body: &str,
    descriptors: &[SecureDataDescriptor],
) -> Result<String> {
    let mut document: Value = serde_json::from_str(body)
        .map_err(|e| TransportError::InvalidRequestBody(e.to_string()))?;

    for descriptor in descriptors {
        descriptor.check_path()?;

        if !manager.trusts_domain(descriptor.instance_id, host).await? {
            return Err(TransportError::UntrustedDomain {
                instance: descriptor.instance_id,
                host: host.to_string(),
            });
        }
        if document.pointer(&descriptor.path).is_none() {
            return Err(TransportError::InvalidDescriptorPath(format!(
                "{:?} not found",
                descriptor.path
            )));
        }

        let sealed = manager.get_sealed_data(descriptor.instance_id).await?;
        substitute(&mut document, &descriptor.path, &sealed)?;

        debug!(
            instance = %descriptor.instance_id,
            path = %descriptor.path,
            "Substituted sealed descriptor"
        );
    }

    Ok(serde_json::to_string(&document)?)
}
