//! Network device SSH integration module
//!
//! - `dialect`: Per-platform commands and prompts
//! - `session`: `ssh` child process lifecycle
//! - `client`: Configuration retrieval over a session

pub mod client;
pub mod dialect;
pub mod session;

pub use client::SshDeviceConnector;

use async_trait::async_trait;

use crate::error::DeviceError;
use crate::models::{Credential, DeviceDescriptor};

/// Pulls the running configuration of one device
///
/// Implementations open and close their own session per call and never write
/// files; persistence belongs to the caller.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn fetch_config(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
    ) -> Result<String, DeviceError>;
}
