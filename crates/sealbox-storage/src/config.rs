//! Storage configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

/// Storage adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one file per storage ID
    pub root_path: PathBuf,

    /// Largest sealed blob accepted for writing (bytes)
    pub max_blob_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_path: Self::default_root_path(),
            max_blob_size: 256 * 1024,
        }
    }
}

impl StorageConfig {
    /// Configuration rooted at `root_path` with default limits
    pub fn with_root(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }

    fn default_root_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| {
                #[cfg(unix)]
                {
                    PathBuf::from("/var/lib")
                }
                #[cfg(windows)]
                {
                    PathBuf::from(r"C:\ProgramData")
                }
            })
            .join("sealbox")
            .join("storage")
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_blob_size == 0 {
            return Err(StorageError::Config(
                "max_blob_size must be positive".to_string(),
            ));
        }
        if self.root_path.as_os_str().is_empty() {
            return Err(StorageError::Config("root_path must be set".to_string()));
        }
        Ok(())
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
