//! Data models for netconfig-backup

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

// ============================================================================
// Credential
// ============================================================================

/// Device login credential, fetched once per run and shared read-only
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Inventory Models
// ============================================================================

/// Inventory entry. Absent or `null` required fields load as empty strings
/// so inventory validation can name the offending entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hostname: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub device_type: String,
    #[serde(default)]
    pub vendor: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(hostname: &str, ip_address: &str, device_type: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            ip_address: ip_address.to_string(),
            device_type: device_type.to_string(),
            vendor: None,
        }
    }

    /// Network address used to reach the device
    pub fn address(&self) -> &str {
        &self.ip_address
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Backup Result Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    Success,
    ConnectFailure,
    AuthFailure,
    OtherError,
}

impl std::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupStatus::Success => write!(f, "success"),
            BackupStatus::ConnectFailure => write!(f, "connect_failure"),
            BackupStatus::AuthFailure => write!(f, "auth_failure"),
            BackupStatus::OtherError => write!(f, "other_error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupResult {
    pub hostname: String,
    pub status: BackupStatus,
    pub saved_path: Option<PathBuf>,
    pub error_detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BackupResult {
    pub fn success(hostname: &str, saved_path: PathBuf) -> Self {
        Self {
            hostname: hostname.to_string(),
            status: BackupStatus::Success,
            saved_path: Some(saved_path),
            error_detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(hostname: &str, status: BackupStatus, detail: String) -> Self {
        Self {
            hostname: hostname.to_string(),
            status,
            saved_path: None,
            error_detail: Some(detail),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BackupStatus::Success
    }
}

/// Outcome of a run that got past its fatal pre-conditions
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<BackupResult>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BackupResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}
