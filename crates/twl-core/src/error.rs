//! Domain error types following the panic-free policy.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A credential field was rejected when constructing an `Identity`
    #[error("Invalid credential: {field} {reason}")]
    InvalidCredential { field: &'static str, reason: String },

    /// A channel name could not be used to join
    #[error("Invalid channel name '{name}': {reason}")]
    InvalidChannel { name: String, reason: String },

    /// A configuration value is out of range
    #[error("Invalid config {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// The configuration file could not be read
    #[error("Failed to read config {path}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    /// The configuration file is not valid TOML for `ListenerConfig`
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),
}

/// Result type for domain operations.
pub type CoreResult<T> = Result<T, CoreError>;
