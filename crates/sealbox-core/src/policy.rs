//! Access policy and the policy engine
//!
//! A [`Policy`] is attached to every secure data instance when it is created
//! and never changes afterwards. The engine in this module is a pure function
//! over the requested [`Operation`], the instance's policy and principals, and
//! the [`AccessContext`] the host presents for the caller.
//!
//! # Attribute semantics
//!
//! - `app_access_control`: `0` leaves the instance open to any caller, `1`
//!   restricts it to the creator and the owners.
//! - `device_locality`: `0` allows any device, any other value must equal the
//!   caller's device locality.
//! - `sensitivity_level`: the caller's clearance must be at least this level.
//!
//! Attribute checks apply to operations that release material (`Read`,
//! `Export`), re-derive it (`Reseal`) or key another seal with it
//! (`UseAsKey`, which ignores `noRead`). Metadata inspection and destruction
//! are never attribute-gated.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ErrorCode, Result};
use crate::types::PrincipalId;

/// Any application may use the instance
pub const APP_ACCESS_ANY: u32 = 0;

/// Only the creator and owners may use the instance
pub const APP_ACCESS_OWNERS: u32 = 1;

/// Device locality code meaning "any device"
pub const DEVICE_LOCALITY_ANY: u32 = 0;

/// Largest accepted device locality code
pub const MAX_DEVICE_LOCALITY: u32 = 255;

/// Largest accepted sensitivity level
pub const MAX_SENSITIVITY_LEVEL: u32 = 255;

/// Access-control attributes of a secure data instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    /// Application access control code
    pub app_access_control: u32,
    /// Device locality code
    pub device_locality: u32,
    /// Sensitivity level
    pub sensitivity_level: u32,
    /// Disallow sealed blob export
    pub no_store: bool,
    /// Disallow plaintext access
    pub no_read: bool,
}

impl Policy {
    /// Unrestricted policy
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_no_read(mut self) -> Self {
        self.no_read = true;
        self
    }

    pub fn with_no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    pub fn restricted_to_owners(mut self) -> Self {
        self.app_access_control = APP_ACCESS_OWNERS;
        self
    }

    pub fn with_device_locality(mut self, locality: u32) -> Self {
        self.device_locality = locality;
        self
    }

    pub fn with_sensitivity_level(mut self, level: u32) -> Self {
        self.sensitivity_level = level;
        self
    }

    /// Reject attribute codes outside their defined ranges
    pub fn validate(&self) -> Result<()> {
        if self.app_access_control > APP_ACCESS_OWNERS {
            return Err(CoreError::InvalidPolicy(format!(
                "app access control {} is not a known code",
                self.app_access_control
            )));
        }
        if self.device_locality > MAX_DEVICE_LOCALITY {
            return Err(CoreError::InvalidPolicy(format!(
                "device locality {} exceeds {}",
                self.device_locality, MAX_DEVICE_LOCALITY
            )));
        }
        if self.sensitivity_level > MAX_SENSITIVITY_LEVEL {
            return Err(CoreError::InvalidPolicy(format!(
                "sensitivity level {} exceeds {}",
                self.sensitivity_level, MAX_SENSITIVITY_LEVEL
            )));
        }
        Ok(())
    }

    /// Evaluate whether `context` may perform `operation`
    pub fn evaluate(
        &self,
        operation: Operation,
        principals: &Principals<'_>,
        context: &AccessContext,
    ) -> std::result::Result<(), Denial> {
        match operation {
            Operation::Inspect | Operation::Destroy => return Ok(()),
            Operation::Read if self.no_read => return Err(Denial::NoRead),
            Operation::Export if self.no_store => return Err(Denial::NoStore),
            _ => {}
        }

        if self.app_access_control == APP_ACCESS_OWNERS {
            let allowed = context
                .principal
                .map(|p| principals.contains(p))
                .unwrap_or(false);
            if !allowed {
                return Err(Denial::NotAnOwner {
                    principal: context.principal,
                });
            }
        }

        if self.device_locality != DEVICE_LOCALITY_ANY
            && self.device_locality != context.device_locality
        {
            return Err(Denial::WrongDeviceLocality {
                required: self.device_locality,
                presented: context.device_locality,
            });
        }

        if context.clearance < self.sensitivity_level {
            return Err(Denial::InsufficientClearance {
                required: self.sensitivity_level,
                presented: context.clearance,
            });
        }

        Ok(())
    }
}

/// Operation requested against a secure data instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Plaintext access
    Read,
    /// Sealed blob export
    Export,
    /// Re-derivation of the sealed form under a new extra key
    Reseal,
    /// Use of the plaintext as extra key material for another seal or unseal
    UseAsKey,
    /// Metadata accessors
    Inspect,
    /// Release of the instance
    Destroy,
}

/// Principals with rights over an instance
#[derive(Debug, Clone, Copy)]
pub struct Principals<'a> {
    pub creator: Option<PrincipalId>,
    pub owners: &'a [PrincipalId],
}

impl Principals<'_> {
    pub fn contains(&self, principal: PrincipalId) -> bool {
        self.creator == Some(principal) || self.owners.contains(&principal)
    }
}

/// Caller attributes presented by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessContext {
    /// Identity of the calling principal, if the host authenticated one
    pub principal: Option<PrincipalId>,
    /// Locality code of the device the call originates from
    pub device_locality: u32,
    /// Clearance of the caller, compared against sensitivity levels
    pub clearance: u32,
}

impl AccessContext {
    /// Anonymous caller with no clearance
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_principal(principal: PrincipalId) -> Self {
        Self {
            principal: Some(principal),
            ..Self::default()
        }
    }

    pub fn with_device_locality(mut self, locality: u32) -> Self {
        self.device_locality = locality;
        self
    }

    pub fn with_clearance(mut self, clearance: u32) -> Self {
        self.clearance = clearance;
        self
    }
}

/// Reason an operation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NoRead,
    NoStore,
    NotAnOwner { principal: Option<PrincipalId> },
    WrongDeviceLocality { required: u32, presented: u32 },
    InsufficientClearance { required: u32, presented: u32 },
}

impl Denial {
    /// Boundary code for this refusal
    pub fn code(&self) -> ErrorCode {
        match self {
            Denial::InsufficientClearance { .. } => ErrorCode::InsufficientTrustLevel,
            _ => ErrorCode::PolicyViolation,
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::NoRead => write!(f, "policy forbids plaintext access"),
            Denial::NoStore => write!(f, "policy forbids sealed export"),
            Denial::NotAnOwner { principal: Some(p) } => {
                write!(f, "principal {} is neither creator nor owner", p)
            }
            Denial::NotAnOwner { principal: None } => {
                write!(f, "owner-restricted data requires an authenticated principal")
            }
            Denial::WrongDeviceLocality {
                required,
                presented,
            } => write!(
                f,
                "device locality {} does not match required {}",
                presented, required
            ),
            Denial::InsufficientClearance {
                required,
                presented,
            } => write!(
                f,
                "clearance {} is below sensitivity level {}",
                presented, required
            ),
        }
    }
}
