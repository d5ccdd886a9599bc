//! Core error types for mealticket-core.
//!
//! Sensor and storage failures are typed errors. Eligibility denials
//! (already redeemed, not at the location, outside the window) are ordinary
//! outcomes and live in [`crate::redemption::RedeemOutcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for mealticket-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Durable store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Location provider errors
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    /// Redemption failures that are not eligibility denials
    #[error("Redemption error: {0}")]
    Redeem(#[from] RedeemError),

    /// Rejected caller input
    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key-value store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Reading a key failed
    #[error("Failed to read '{key}': {message}")]
    Read { key: String, message: String },

    /// Writing a key failed; the previous value is still in place
    #[error("Failed to write '{key}': {message}")]
    Write { key: String, message: String },

    /// Persisted value could not be decoded
    #[error("Stored value for '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Location provider errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// The user refused location access; the stream never starts
    #[error("Location permission denied")]
    PermissionDenied,

    /// The provider failed to deliver a position
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Redemption failures. Denials are not represented here.
#[derive(Error, Debug)]
pub enum RedeemError {
    /// No record with this id
    #[error("Unknown student: {0}")]
    UnknownStudent(String),

    /// Eligible, but the commit could not be written; safe to retry
    #[error("Redemption could not be persisted: {0}")]
    PersistenceFailed(#[source] StorageError),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
