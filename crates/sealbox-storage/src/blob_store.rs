//! Raw sealed blob stores
//!
//! A blob store maps storage IDs to sealed strings. It performs no
//! cryptography of its own: everything it holds was produced by the sealing
//! oracle and is opaque to it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Longest accepted storage ID
pub const MAX_STORAGE_ID_LENGTH: usize = 128;

const BLOB_EXTENSION: &str = "blob";

/// Check that `id` is a usable storage ID
///
/// IDs are 1 to 128 characters of `[A-Za-z0-9._-]` and may not start with a
/// dot, so they always name a plain file directly under the store root.
pub fn validate_storage_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_STORAGE_ID_LENGTH {
        return Err(StorageError::InvalidIdentifier(format!(
            "length {} outside 1..={}",
            id.len(),
            MAX_STORAGE_ID_LENGTH
        )));
    }
    if id.starts_with('.') {
        return Err(StorageError::InvalidIdentifier(format!(
            "{:?} starts with a dot",
            id
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(StorageError::InvalidIdentifier(format!(
            "{:?} contains {:?}",
            id, c
        )));
    }
    Ok(())
}

/// Trait for sealed blob back ends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `sealed` under `id`, replacing any previous blob
    async fn put(&self, id: &str, sealed: &str) -> Result<()>;

    /// Fetch the blob stored under `id`
    async fn get(&self, id: &str) -> Result<Option<String>>;

    /// Remove the blob under `id`, returning whether one existed
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Whether a blob is stored under `id`
    async fn exists(&self, id: &str) -> Result<bool>;
}

/// One file per storage ID under a root directory
pub struct FileBlobStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl FileBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o700)).await?;
        }

        debug!(root = %root.display(), "Opened file blob store");
        Ok(Self {
            root,
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &str) -> Result<PathBuf> {
        validate_storage_id(id)?;
        Ok(self.root.join(format!("{}.{}", id, BLOB_EXTENSION)))
    }

    /// Write `sealed` to `temp_path` owner-only, then move it over `path`
    async fn stage(temp_path: &Path, path: &Path, sealed: &str) -> std::io::Result<()> {
        tokio::fs::write(temp_path, sealed.as_bytes()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(temp_path, path).await
    }

    /// Overwrite a file with zeros, then unlink it
    async fn shred(path: &Path) -> Result<()> {
        let len = tokio::fs::metadata(path).await?.len() as usize;
        tokio::fs::write(path, vec![0u8; len]).await?;
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, id: &str, sealed: &str) -> Result<()> {
        let path = self.blob_path(id)?;

        // Write to a unique temp file first, then rename for atomicity
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .root
            .join(format!(".{}.{}.{}.tmp", id, std::process::id(), n));

        if let Err(e) = Self::stage(&temp_path, &path, sealed).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            debug!(id, error = %e, "Discarded partially written blob");
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<String>> {
        let path = self.blob_path(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let path = self.blob_path(id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        Self::shred(&path).await?;
        Ok(true)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let path = self.blob_path(id)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

/// In-memory store, for tests and ephemeral hosts
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: &str, sealed: &str) -> Result<()> {
        validate_storage_id(id)?;
        self.blobs
            .write()
            .await
            .insert(id.to_string(), sealed.to_string());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<String>> {
        validate_storage_id(id)?;
        Ok(self.blobs.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        validate_storage_id(id)?;
        Ok(self.blobs.write().await.remove(id).is_some())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        validate_storage_id(id)?;
        Ok(self.blobs.read().await.contains_key(id))
    }
}
