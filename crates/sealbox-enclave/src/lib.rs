//! Sealbox Enclave - Secure data instance manager
//!
//! This crate provides:
//! - The [`SealingOracle`] seam to the platform's sealing primitive
//! - A software oracle built on ChaCha20-Poly1305 for hosts without one
//! - The [`InstanceManager`] owning the table of live secure data instances
//! - Enclave configuration

pub mod config;
pub mod error;
mod instance;
pub mod manager;
pub mod oracle;

pub use config::EnclaveConfig;
pub use error::{EnclaveError, Result};
pub use manager::InstanceManager;
pub use oracle::{software::SoftwareOracle, OracleError, SealRequest, SealingOracle, UnsealedData};
