//! Enclave configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EnclaveError, Result};

/// Instance manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnclaveConfig {
    /// Upper bound on a single sealing oracle call (milliseconds)
    pub oracle_timeout_ms: u64,

    /// Largest accepted plaintext (bytes)
    pub max_data_size: usize,

    /// Longest accepted tag (bytes)
    pub max_tag_length: usize,

    /// Most owners per instance
    pub max_owners: usize,

    /// Most trusted web domains per instance
    pub max_web_owners: usize,

    /// Seal at creation instead of on first export
    pub eager_sealing: bool,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: 5_000,
            max_data_size: 64 * 1024,
            max_tag_length: 256,
            max_owners: 16,
            max_web_owners: 16,
            eager_sealing: false,
        }
    }
}

impl EnclaveConfig {
    /// Oracle timeout as a duration
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Reject settings that would make every call fail
    pub fn validate(&self) -> Result<()> {
        if self.oracle_timeout_ms == 0 {
            return Err(EnclaveError::Config(
                "oracle_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_data_size == 0 {
            return Err(EnclaveError::Config(
                "max_data_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
