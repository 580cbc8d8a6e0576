//! Searchlight Core - Foundation crate for the Searchlight audit service.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other Searchlight crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes and enums (`OrganizationId`, `AuditId`, `Role`, `AuditStatus`)
//! - [`time`] - Canonical timestamp text format used in the database
//!
//! # Example
//!
//! ```rust
//! use searchlight_core::{AppConfig, AuditStatus};
//!
//! let config = AppConfig::default();
//! assert!(config.validate().is_ok());
//! assert!(AuditStatus::BatchComplete.is_claimable());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, AuthConfig, CrawlerConfig, DatabaseConfig, LlmConfig, RunnerConfig, ServerConfig,
};
pub use error::{ConfigError, ConfigResult, Result, SearchlightError};
pub use types::{AuditId, AuditKind, AuditStatus, OrganizationId, Role, UserId};
