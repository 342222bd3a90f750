//! Error handling module
//!
//! `SecretError` and `InventoryError` are fatal to a run and travel inside
//! `RunError`. `DeviceError` never leaves the per-device boundary: the runner
//! folds it into that device's `BackupResult`.

use thiserror::Error;

use crate::models::BackupStatus;

/// Secrets service failures
#[derive(Error, Debug)]
pub enum SecretError {
    /// Token rejected or service unreachable
    #[error("Secrets service authentication failed: {0}")]
    Authentication(String),

    /// Secret path missing, empty, or lacking required fields
    #[error("Secret not found at {path}: {reason}")]
    NotFound { path: String, reason: String },
}

/// Inventory document failures
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Failed to read inventory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse inventory: {0}")]
    Parse(#[from] serde_json::Error),

    /// First offending entry of an otherwise well-formed document
    #[error("Invalid inventory entry #{index} ({hostname}): {reason}")]
    Format {
        index: usize,
        hostname: String,
        reason: String,
    },
}

/// Per-device session failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Unreachable, port closed, or no login prompt within the connect timeout
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Credential or privilege elevation rejected by the device
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl DeviceError {
    pub fn status(&self) -> BackupStatus {
        match self {
            DeviceError::Connect(_) => BackupStatus::ConnectFailure,
            DeviceError::Auth(_) => BackupStatus::AuthFailure,
            DeviceError::Other(_) => BackupStatus::OtherError,
        }
    }
}

/// Conditions that abort a run before any device is attempted
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Credential retrieval failed: {0}")]
    Secret(#[from] SecretError),

    #[error("Inventory load failed: {0}")]
    Inventory(#[from] InventoryError),
}
