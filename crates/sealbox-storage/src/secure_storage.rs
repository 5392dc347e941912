//! Secure storage adapter
//!
//! Persists secure data instances as sealed blobs and restores them as new
//! instances. Plaintext never crosses this layer: writes go through
//! [`InstanceManager::get_sealed_data`], so a `noStore` instance cannot be
//! persisted, and reads go through [`InstanceManager::create_from_sealed_data`],
//! so a forged or re-bound blob never becomes an instance.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use sealbox_core::{InstanceId, SealedDataOptions};
use sealbox_enclave::InstanceManager;

use crate::blob_store::{validate_storage_id, BlobStore, FileBlobStore};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};

/// The only supported storage type: the local device
pub const STORAGE_TYPE_LOCAL: u32 = 0;

/// Identifies a storage resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOptions {
    /// Storage resource identifier
    pub id: String,
    /// Storage type
    #[serde(default)]
    pub storage_type: u32,
}

impl StorageOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            storage_type: STORAGE_TYPE_LOCAL,
        }
    }
}

/// Options for restoring an instance from storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReadOptions {
    pub id: String,
    #[serde(default)]
    pub storage_type: u32,
    /// Instance whose plaintext was mixed into the sealing key
    #[serde(default)]
    pub extra_key: Option<InstanceId>,
}

impl StorageReadOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            storage_type: STORAGE_TYPE_LOCAL,
            extra_key: None,
        }
    }

    pub fn extra_key(mut self, extra_key: InstanceId) -> Self {
        self.extra_key = Some(extra_key);
        self
    }
}

/// Options for persisting an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageWriteOptions {
    pub id: String,
    #[serde(default)]
    pub storage_type: u32,
    #[serde(rename = "instanceID")]
    pub instance_id: InstanceId,
}

impl StorageWriteOptions {
    pub fn new(id: impl Into<String>, instance_id: InstanceId) -> Self {
        Self {
            id: id.into(),
            storage_type: STORAGE_TYPE_LOCAL,
            instance_id,
        }
    }
}

/// Storage adapter bound to one instance manager handle
pub struct SecureStorage {
    manager: InstanceManager,
    store: Arc<dyn BlobStore>,
    config: StorageConfig,
}

impl SecureStorage {
    /// Create an adapter over an existing blob store
    pub fn new(
        manager: InstanceManager,
        store: Arc<dyn BlobStore>,
        config: StorageConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            manager,
            store,
            config,
        })
    }

    /// Create an adapter over a file store at `config.root_path`
    pub async fn open(manager: InstanceManager, config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let store = FileBlobStore::open(config.root_path.clone()).await?;
        info!(root = %config.root_path.display(), "Secure storage ready");
        Self::new(manager, Arc::new(store), config)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Restore the blob under `options.id` as a new instance
    pub async fn read(&self, options: StorageReadOptions) -> Result<InstanceId> {
        Self::check_target(&options.id, options.storage_type)?;

        let sealed = self
            .store
            .get(&options.id)
            .await?
            .ok_or_else(|| StorageError::NotFound(options.id.clone()))?;

        let mut restore = SealedDataOptions::new(sealed);
        if let Some(key) = options.extra_key {
            restore = restore.extra_key(key);
        }
        let instance = self.manager.create_from_sealed_data(restore).await?;

        debug!(storage_id = %options.id, instance = %instance, "Restored instance from storage");
        Ok(instance)
    }

    /// Persist the sealed form of `options.instance_id` under `options.id`
    ///
    /// An existing blob under the same ID is replaced.
    pub async fn write(&self, options: StorageWriteOptions) -> Result<()> {
        Self::check_target(&options.id, options.storage_type)?;

        let sealed = self.manager.get_sealed_data(options.instance_id).await?;
        if sealed.len() > self.config.max_blob_size {
            return Err(StorageError::BlobTooLarge {
                size: sealed.len(),
                limit: self.config.max_blob_size,
            });
        }

        self.store.put(&options.id, &sealed).await?;

        info!(
            storage_id = %options.id,
            instance = %options.instance_id,
            size = sealed.len(),
            "Wrote sealed instance to storage"
        );
        Ok(())
    }

    /// Remove the blob under `options.id`
    pub async fn delete(&self, options: StorageOptions) -> Result<()> {
        Self::check_target(&options.id, options.storage_type)?;

        if !self.store.remove(&options.id).await? {
            return Err(StorageError::NotFound(options.id));
        }

        info!(storage_id = %options.id, "Deleted sealed data from storage");
        Ok(())
    }

    fn check_target(id: &str, storage_type: u32) -> Result<()> {
        if storage_type != STORAGE_TYPE_LOCAL {
            return Err(StorageError::InvalidType(storage_type));
        }
        validate_storage_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::MemoryBlobStore;
    use sealbox_core::{CreateOptions, Policy, PrincipalId, ToErrorObject};
    use sealbox_enclave::{EnclaveConfig, EnclaveError, SoftwareOracle};
    use tempfile::TempDir;

    fn manager() -> InstanceManager {
        InstanceManager::new(
            Arc::new(SoftwareOracle::from_platform_key([3u8; 32])),
            EnclaveConfig::default(),
        )
        .unwrap()
    }

    fn memory_storage(manager: &InstanceManager) -> (SecureStorage, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        let storage = SecureStorage::new(
            manager.clone(),
            store.clone(),
            StorageConfig::with_root("/unused"),
        )
        .unwrap();
        (storage, store)
    }

    #[tokio::test]
    async fn test_write_destroy_read_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager();
        let storage = SecureStorage::open(manager.clone(), StorageConfig::with_root(temp_dir.path()))
            .await
            .unwrap();

        let id = manager
            .create_from_data(
                CreateOptions::new("persist me")
                    .tag("wallet")
                    .owners([PrincipalId(4)]),
            )
            .await
            .unwrap();
        storage
            .write(StorageWriteOptions::new("wallet.seed", id))
            .await
            .unwrap();
        manager.destroy(id).await.unwrap();

        let restored = storage
            .read(StorageReadOptions::new("wallet.seed"))
            .await
            .unwrap();
        assert_ne!(restored, id);
        assert_eq!(manager.get_data(restored).await.unwrap().as_str(), "persist me");
        assert_eq!(manager.get_tag(restored).await.unwrap().as_deref(), Some("wallet"));
        assert_eq!(manager.get_owners(restored).await.unwrap(), vec![PrincipalId(4)]);

        // The file holds only the sealed form
        let on_disk = std::fs::read_to_string(temp_dir.path().join("wallet.seed.blob")).unwrap();
        assert!(!on_disk.contains("persist me"));
    }

    #[tokio::test]
    async fn test_read_with_extra_key() {
        let manager = manager();
        let (storage, _) = memory_storage(&manager);

        let key = manager
            .create_from_data(CreateOptions::new("pin-1234"))
            .await
            .unwrap();
        let id = manager
            .create_from_data(CreateOptions::new("payload").extra_key(key))
            .await
            .unwrap();
        storage
            .write(StorageWriteOptions::new("bound", id))
            .await
            .unwrap();

        assert!(matches!(
            storage.read(StorageReadOptions::new("bound")).await,
            Err(StorageError::Enclave(EnclaveError::UnsealFailed))
        ));
        let restored = storage
            .read(StorageReadOptions::new("bound").extra_key(key))
            .await
            .unwrap();
        assert_eq!(manager.get_data(restored).await.unwrap().as_str(), "payload");
    }

    #[tokio::test]
    async fn test_no_store_instance_is_not_written() {
        let manager = manager();
        let (storage, store) = memory_storage(&manager);

        let id = manager
            .create_from_data(CreateOptions::new("ephemeral").policy(Policy::new().with_no_store()))
            .await
            .unwrap();
        let err = storage
            .write(StorageWriteOptions::new("nope", id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Enclave(EnclaveError::NoStorePolicy(_))
        ));
        assert_eq!(err.to_error_object().code, 13);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_targets() {
        let manager = manager();
        let (storage, _) = memory_storage(&manager);

        let err = storage.read(StorageReadOptions::new("absent")).await.unwrap_err();
        assert_eq!(err.to_error_object().code, 3);

        let err = storage.delete(StorageOptions::new("absent")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        let err = storage.delete(StorageOptions::new("../etc")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidIdentifier(_)));

        let mut remote = StorageOptions::new("k");
        remote.storage_type = 1;
        let err = storage.delete(remote).await.unwrap_err();
        assert_eq!(err.to_error_object().code, 10);

        let err = storage
            .write(StorageWriteOptions::new("k", InstanceId(77)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Enclave(EnclaveError::InstanceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let manager = manager();
        let (storage, store) = memory_storage(&manager);

        let first = manager.create_from_data(CreateOptions::new("one")).await.unwrap();
        let second = manager.create_from_data(CreateOptions::new("two")).await.unwrap();
        storage.write(StorageWriteOptions::new("slot", first)).await.unwrap();
        storage.write(StorageWriteOptions::new("slot", second)).await.unwrap();

        let restored = storage.read(StorageReadOptions::new("slot")).await.unwrap();
        assert_eq!(manager.get_data(restored).await.unwrap().as_str(), "two");

        storage.delete(StorageOptions::new("slot")).await.unwrap();
        assert!(!store.exists("slot").await.unwrap());
    }

    #[tokio::test]
    async fn test_blob_size_limit() {
        let manager = manager();
        let storage = SecureStorage::new(
            manager.clone(),
            Arc::new(MemoryBlobStore::new()),
            StorageConfig {
                max_blob_size: 16,
                ..StorageConfig::with_root("/unused")
            },
        )
        .unwrap();

        let id = manager.create_from_data(CreateOptions::new("x")).await.unwrap();
        assert!(matches!(
            storage.write(StorageWriteOptions::new("small", id)).await,
            Err(StorageError::BlobTooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn test_options_wire_names() {
        let opts: StorageWriteOptions =
            serde_json::from_str(r#"{"id":"a","instanceID":5}"#).unwrap();
        assert_eq!(opts.instance_id, InstanceId(5));
        assert_eq!(opts.storage_type, STORAGE_TYPE_LOCAL);

        let opts: StorageReadOptions =
            serde_json::from_str(r#"{"id":"a","storageType":0,"extraKey":2}"#).unwrap();
        assert_eq!(opts.extra_key, Some(InstanceId(2)));
    }
}
