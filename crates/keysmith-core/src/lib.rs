//! # keysmith-core
//!
//! Core types, configuration, and utilities for Keysmith.
//!
//! This crate provides shared functionality used by the keychain crate:
//!
//! - **Configuration**: Loading, validation, and environment overrides
//! - **Types**: Declarative access-policy types (protection tiers, capabilities)
//! - **Secrets**: Zeroizing containers for secret strings and bytes
//! - **Logging**: `tracing` subscriber setup

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod paths;
pub mod secret;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use secret::{SecretBytes, SecretString};
pub use types::*;
