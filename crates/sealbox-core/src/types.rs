//! Identifier newtypes

use serde::{Deserialize, Serialize};

/// Handle of a live secure data instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl InstanceId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for InstanceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique ID of a creator or owner principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub u64);

impl PrincipalId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PrincipalId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check that a trusted web domain is a plain lowercase DNS host
///
/// Labels are 1-63 characters of `[a-z0-9-]`, may not start or end with a
/// hyphen, and the whole host is at most 253 characters.
pub fn is_valid_web_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > crate::MAX_WEB_DOMAIN_LENGTH {
        return false;
    }

    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_serializes_as_number() {
        let id = InstanceId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_web_domain_validation() {
        assert!(is_valid_web_domain("example.com"));
        assert!(is_valid_web_domain("api.bank-1.example"));
        assert!(is_valid_web_domain("localhost"));

        assert!(!is_valid_web_domain(""));
        assert!(!is_valid_web_domain("Example.com"));
        assert!(!is_valid_web_domain("https://example.com"));
        assert!(!is_valid_web_domain("example..com"));
        assert!(!is_valid_web_domain("-bad.example"));
        assert!(!is_valid_web_domain("bad-.example"));
        assert!(!is_valid_web_domain("exa mple.com"));
    }
}
