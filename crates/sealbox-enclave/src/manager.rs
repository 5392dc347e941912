//! Secure data instance manager
//!
//! Owns the table of live secure data instances and orchestrates creation,
//! sealing, re-keying and release. Every call is checked against the
//! instance's policy before plaintext or sealed material leaves the manager.
//!
//! # Concurrency
//!
//! The table sits behind a single `RwLock`. Oracle calls are made with the lock
//! released: the manager snapshots what it needs, seals or unseals, and then
//! publishes the result under the write lock. A creation or re-key that fails,
//! times out or is cancelled never leaves a partial entry behind, and a seal
//! that raced a re-key is discarded instead of overwriting the newer form.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use sealbox_core::{
    types::is_valid_web_domain, AccessContext, CoreError, CreateOptions, InstanceId,
    InstanceMetadata, Operation, Policy, PrincipalId, SealedDataOptions,
};

use crate::config::EnclaveConfig;
use crate::error::{EnclaveError, Result};
use crate::instance::SecureDataInstance;
use crate::oracle::{OracleError, SealRequest, SealingOracle};

type InstanceTable = HashMap<InstanceId, SecureDataInstance>;

/// State shared by every handle onto one instance table
struct Shared {
    oracle: Arc<dyn SealingOracle>,
    config: EnclaveConfig,
    instances: RwLock<InstanceTable>,
    next_id: AtomicU64,
}

/// Handle onto an instance table, bound to one caller context
///
/// Clones share the same table. Use [`InstanceManager::with_context`] to act
/// on behalf of a different caller.
#[derive(Clone)]
pub struct InstanceManager {
    shared: Arc<Shared>,
    context: AccessContext,
}

impl InstanceManager {
    /// Create a manager with an empty table and an anonymous caller
    pub fn new(oracle: Arc<dyn SealingOracle>, config: EnclaveConfig) -> Result<Self> {
        config.validate()?;
        info!(
            oracle = oracle.oracle_type(),
            timeout_ms = config.oracle_timeout_ms,
            "Secure data instance manager ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                oracle,
                config,
                instances: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
            context: AccessContext::anonymous(),
        })
    }

    /// Handle onto the same table acting for `context`
    pub fn with_context(&self, context: AccessContext) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            context,
        }
    }

    /// Caller context of this handle
    pub fn context(&self) -> &AccessContext {
        &self.context
    }

    /// Manager configuration
    pub fn config(&self) -> &EnclaveConfig {
        &self.shared.config
    }

    /// Create an instance from plaintext
    pub async fn create_from_data(&self, options: CreateOptions) -> Result<InstanceId> {
        self.validate_create(&options)?;
        let CreateOptions {
            data,
            extra_key,
            metadata,
        } = options;

        let mut instance = SecureDataInstance::new(data, metadata, extra_key);

        if self.shared.config.eager_sealing && !instance.metadata.policy.no_store {
            let secret = match extra_key {
                Some(key) => Some(self.extra_key_secret(key).await?),
                None => None,
            };
            let blob = self
                .call_oracle(self.shared.oracle.seal(SealRequest {
                    plaintext: instance.plaintext.as_str(),
                    metadata: &instance.metadata,
                    extra_key: secret.as_ref().map(|s| s.as_slice()),
                }))
                .await?;
            instance.sealed = Some(blob);
        }

        self.publish(instance).await
    }

    /// Create an instance by unsealing a blob
    ///
    /// Tag, policy and principals come from the blob, not from the caller.
    pub async fn create_from_sealed_data(&self, options: SealedDataOptions) -> Result<InstanceId> {
        let secret = match options.extra_key {
            Some(key) => Some(self.extra_key_secret(key).await?),
            None => None,
        };

        let unsealed = self
            .call_oracle(
                self.shared
                    .oracle
                    .unseal(&options.sealed_data, secret.as_ref().map(|s| s.as_slice())),
            )
            .await
            .inspect_err(|e| {
                if matches!(e, EnclaveError::UnsealFailed) {
                    warn!("Rejected sealed data that failed authentication");
                }
            })?;

        unsealed.metadata.policy.validate()?;

        let mut instance =
            SecureDataInstance::new(unsealed.plaintext, unsealed.metadata, options.extra_key);
        if !instance.metadata.policy.no_store {
            instance.sealed = Some(options.sealed_data);
        }

        self.publish(instance).await
    }

    /// Re-seal an instance under a new extra key
    ///
    /// Plaintext, policy and identity are unchanged. The previously cached
    /// sealed form is replaced only once the new one has been produced.
    pub async fn change_extra_key(&self, id: InstanceId, extra_key: InstanceId) -> Result<()> {
        if id == extra_key {
            return Err(EnclaveError::InvalidReference(format!(
                "instance {} cannot be its own extra key",
                id
            )));
        }

        let (plaintext, metadata, secret) = {
            let instances = self.shared.instances.read().await;
            let instance = Self::lookup(&instances, id)?;
            self.authorize(id, instance, Operation::Reseal)?;
            let secret = self.secret_of(&instances, extra_key)?;
            (instance.plaintext.clone(), instance.metadata.clone(), secret)
        };

        let blob = self
            .call_oracle(self.shared.oracle.seal(SealRequest {
                plaintext: plaintext.as_str(),
                metadata: &metadata,
                extra_key: Some(secret.as_slice()),
            }))
            .await?;

        let mut instances = self.shared.instances.write().await;
        if !instances.contains_key(&extra_key) {
            return Err(Self::stale_extra_key(extra_key));
        }
        let instance = instances
            .get_mut(&id)
            .ok_or(EnclaveError::InstanceNotFound(id))?;

        instance.extra_key_ref = Some(extra_key);
        instance.sealed = Some(blob);
        instance.generation += 1;

        info!(instance = %id, extra_key = %extra_key, "Re-keyed secure data instance");
        Ok(())
    }

    /// Plaintext of an instance
    pub async fn get_data(&self, id: InstanceId) -> Result<Zeroizing<String>> {
        let instances = self.shared.instances.read().await;
        let instance = Self::lookup(&instances, id)?;
        self.authorize(id, instance, Operation::Read)?;
        Ok(instance.plaintext.clone())
    }

    /// Sealed form of an instance, sealing on first use
    pub async fn get_sealed_data(&self, id: InstanceId) -> Result<String> {
        let (plaintext, metadata, secret, generation) = {
            let instances = self.shared.instances.read().await;
            let instance = Self::lookup(&instances, id)?;
            self.authorize(id, instance, Operation::Export)?;

            if let Some(blob) = &instance.sealed {
                debug!(instance = %id, "Serving cached sealed form");
                return Ok(blob.clone());
            }

            let secret = match instance.extra_key_ref {
                Some(key) => Some(self.secret_of(&instances, key)?),
                None => None,
            };
            (
                instance.plaintext.clone(),
                instance.metadata.clone(),
                secret,
                instance.generation,
            )
        };

        let blob = self
            .call_oracle(self.shared.oracle.seal(SealRequest {
                plaintext: plaintext.as_str(),
                metadata: &metadata,
                extra_key: secret.as_ref().map(|s| s.as_slice()),
            }))
            .await?;

        let mut instances = self.shared.instances.write().await;
        let (current_generation, key_ref) = Self::lookup(&instances, id)
            .map(|instance| (instance.generation, instance.extra_key_ref))?;
        if current_generation == generation {
            if let Some(key) = key_ref {
                if !instances.contains_key(&key) {
                    warn!(instance = %id, extra_key = %key, "Extra key destroyed while sealing");
                    return Err(Self::stale_extra_key(key));
                }
            }
        }
        let instance = instances
            .get_mut(&id)
            .ok_or(EnclaveError::InstanceNotFound(id))?;

        if instance.generation == generation {
            instance.sealed = Some(blob.clone());
            debug!(instance = %id, "Sealed secure data instance");
            Ok(blob)
        } else {
            // Re-keyed while sealing; the re-key published the current form
            instance.sealed.clone().ok_or_else(|| {
                EnclaveError::Internal(format!("instance {} re-keyed without a sealed form", id))
            })
        }
    }

    /// Tag of an instance
    pub async fn get_tag(&self, id: InstanceId) -> Result<Option<String>> {
        self.inspect(id, |m| m.tag.clone()).await
    }

    /// Policy of an instance
    pub async fn get_policy(&self, id: InstanceId) -> Result<Policy> {
        self.inspect(id, |m| m.policy).await
    }

    /// Creator of an instance
    pub async fn get_creator(&self, id: InstanceId) -> Result<Option<PrincipalId>> {
        self.inspect(id, |m| m.creator).await
    }

    /// Trusted web domains of an instance
    pub async fn get_web_owners(&self, id: InstanceId) -> Result<Vec<String>> {
        self.inspect(id, |m| m.web_owners.clone()).await
    }

    /// Owners of an instance
    pub async fn get_owners(&self, id: InstanceId) -> Result<Vec<PrincipalId>> {
        self.inspect(id, |m| m.owners.clone()).await
    }

    /// Whether `domain` is one of the instance's trusted web owners
    pub async fn trusts_domain(&self, id: InstanceId, domain: &str) -> Result<bool> {
        self.inspect(id, |m| m.trusts_domain(domain)).await
    }

    /// Release an instance, wiping its plaintext
    ///
    /// A second destroy of the same ID fails with `InstanceNotFound`.
    pub async fn destroy(&self, id: InstanceId) -> Result<()> {
        let mut instances = self.shared.instances.write().await;
        let instance = instances
            .get_mut(&id)
            .ok_or(EnclaveError::InstanceNotFound(id))?;
        self.authorize(id, instance, Operation::Destroy)?;

        instance.wipe();
        instances.remove(&id);

        info!(instance = %id, "Destroyed secure data instance");
        Ok(())
    }

    /// Whether `id` names a live instance
    pub async fn contains(&self, id: InstanceId) -> bool {
        self.shared.instances.read().await.contains_key(&id)
    }

    /// Number of live instances
    pub async fn live_instances(&self) -> usize {
        self.shared.instances.read().await.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Insert a fully built instance, checking its extra key is still live
    async fn publish(&self, instance: SecureDataInstance) -> Result<InstanceId> {
        let mut instances = self.shared.instances.write().await;

        if let Some(key) = instance.extra_key_ref {
            let key_instance = instances
                .get(&key)
                .ok_or_else(|| Self::stale_extra_key(key))?;
            self.authorize(key, key_instance, Operation::UseAsKey)?;
        }

        let id = InstanceId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        info!(
            instance = %id,
            tagged = instance.metadata.tag.is_some(),
            no_read = instance.metadata.policy.no_read,
            no_store = instance.metadata.policy.no_store,
            extra_key = instance.extra_key_ref.is_some(),
            "Created secure data instance"
        );
        instances.insert(id, instance);
        Ok(id)
    }

    async fn inspect<T>(&self, id: InstanceId, f: impl FnOnce(&InstanceMetadata) -> T) -> Result<T> {
        let instances = self.shared.instances.read().await;
        let instance = Self::lookup(&instances, id)?;
        self.authorize(id, instance, Operation::Inspect)?;
        Ok(f(&instance.metadata))
    }

    async fn extra_key_secret(&self, key: InstanceId) -> Result<Zeroizing<Vec<u8>>> {
        let instances = self.shared.instances.read().await;
        self.secret_of(&instances, key)
    }

    /// Bound an oracle call by the configured timeout
    async fn call_oracle<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, OracleError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.shared.config.oracle_timeout(), call).await {
            Ok(result) => result.map_err(|e| {
                debug!(error = %e, "Sealing oracle call failed");
                EnclaveError::from(e)
            }),
            Err(_) => {
                warn!(
                    timeout_ms = self.shared.config.oracle_timeout_ms,
                    "Sealing oracle call timed out"
                );
                Err(EnclaveError::Timeout)
            }
        }
    }

    fn authorize(
        &self,
        id: InstanceId,
        instance: &SecureDataInstance,
        operation: Operation,
    ) -> Result<()> {
        instance
            .metadata
            .policy
            .evaluate(operation, &instance.metadata.principals(), &self.context)
            .map_err(|denial| {
                debug!(instance = %id, ?operation, %denial, "Policy refused operation");
                EnclaveError::from_denial(id, denial)
            })
    }

    fn validate_create(&self, options: &CreateOptions) -> Result<()> {
        let config = &self.shared.config;
        let metadata = &options.metadata;

        if options.data.is_empty() {
            return Err(EnclaveError::InvalidInputSize(
                "data must not be empty".to_string(),
            ));
        }
        if options.data.len() > config.max_data_size {
            return Err(EnclaveError::InvalidInputSize(format!(
                "data is {} bytes, limit is {}",
                options.data.len(),
                config.max_data_size
            )));
        }
        if let Some(tag) = &metadata.tag {
            if tag.len() > config.max_tag_length {
                return Err(EnclaveError::InvalidInputSize(format!(
                    "tag is {} bytes, limit is {}",
                    tag.len(),
                    config.max_tag_length
                )));
            }
        }
        if metadata.owners.len() > config.max_owners {
            return Err(EnclaveError::InvalidNumberOfOwners(metadata.owners.len()));
        }
        if metadata.web_owners.len() > config.max_web_owners {
            return Err(EnclaveError::InvalidWebDomainsListSize(
                metadata.web_owners.len(),
            ));
        }
        if let Some(bad) = metadata
            .web_owners
            .iter()
            .find(|domain| !is_valid_web_domain(domain))
        {
            return Err(EnclaveError::InvalidReference(
                CoreError::InvalidWebDomain(bad.clone()).to_string(),
            ));
        }

        metadata.policy.validate()?;
        Ok(())
    }

    fn lookup(instances: &InstanceTable, id: InstanceId) -> Result<&SecureDataInstance> {
        instances.get(&id).ok_or(EnclaveError::InstanceNotFound(id))
    }

    /// Key material of `key`, if this caller may use it as an extra key
    ///
    /// `noRead` does not apply; owner, locality and clearance checks do.
    fn secret_of(&self, instances: &InstanceTable, key: InstanceId) -> Result<Zeroizing<Vec<u8>>> {
        let instance = instances
            .get(&key)
            .ok_or_else(|| Self::stale_extra_key(key))?;
        self.authorize(key, instance, Operation::UseAsKey)?;
        Ok(instance.secret())
    }

    fn stale_extra_key(key: InstanceId) -> EnclaveError {
        EnclaveError::InvalidReference(format!("extra key {} is not a live instance", key))
    }
}
