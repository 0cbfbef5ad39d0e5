//! Configuration management for Lumen
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use lumen::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `LUMEN__<section>__<key>`
//!
//! Examples:
//! - `LUMEN__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `LUMEN__SERVER__DEBUG=true`
//! - `LUMEN__SOURCE__PATH_PREFIX=/uploads`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/lumen.toml`.
//! This can be overridden using the `LUMEN_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, ProcessorConfig, ServerConfig, SourceConfig, StorageKind};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`LUMEN__*`)
    /// 2. TOML file (default: `config/lumen.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails (missing bucket, bad path prefix, unknown processor keys, ...).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, including environment secrets
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_with_secrets(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}
