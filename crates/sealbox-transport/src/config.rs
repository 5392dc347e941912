//! Transport configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Secure transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Response timeout used when a session does not set one (milliseconds)
    pub default_timeout_ms: u64,

    /// Largest timeout a session may request (milliseconds)
    pub max_timeout_ms: u64,

    /// Most headers a session may carry
    pub max_headers: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_timeout_ms: 300_000,
            max_headers: 64,
        }
    }
}

impl TransportConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_timeout_ms == 0 {
            return Err(TransportError::Config(
                "max_timeout_ms must be positive".to_string(),
            ));
        }
        if self.default_timeout_ms == 0 || self.default_timeout_ms > self.max_timeout_ms {
            return Err(TransportError::Config(format!(
                "default_timeout_ms must be in 1..={}",
                self.max_timeout_ms
            )));
        }
        Ok(())
    }

    /// Check a caller-supplied timeout
    pub fn check_timeout(&self, timeout_ms: u64) -> Result<Duration> {
        if timeout_ms == 0 || timeout_ms > self.max_timeout_ms {
            return Err(TransportError::InvalidTimeout(timeout_ms));
        }
        Ok(Duration::from_millis(timeout_ms))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_timeout_bounds() {
        let config = TransportConfig::default();
        assert!(config.check_timeout(1).is_ok());
        assert!(config.check_timeout(300_000).is_ok());
        assert!(matches!(
            config.check_timeout(0),
            Err(TransportError::InvalidTimeout(0))
        ));
        assert!(matches!(
            config.check_timeout(300_001),
            Err(TransportError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_default_above_max_rejected() {
        let config = TransportConfig {
            default_timeout_ms: 10_000,
            max_timeout_ms: 5_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TransportError::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("transport.json");

        let config = TransportConfig {
            max_headers: 8,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(TransportConfig::load(&path).unwrap(), config);
    }
}
