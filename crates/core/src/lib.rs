//! Core functionality shared across the AttestBridge workspace.
//!
//! This crate provides configuration loading, logging initialization and the
//! core error type used by the attestation service and its host bridges.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    CloudConfig, Config, ConfigError, DispatchConfig, ForeignConfig, LoggingConfig,
    ProviderConfig, ProviderSelection,
};
pub use error::CoreError;
