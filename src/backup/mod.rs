//! Backup orchestration module
//!
//! - `runner`: Credential, inventory and per-device loop
//! - `storage`: Date-stamped configuration files
//! - `summary`: Run report and exit status

pub mod runner;
pub mod storage;
pub mod summary;

pub use runner::{BackupRunner, RunnerSettings};
