//! Device inventory loader
//!
//! JSON document with a top-level `devices` array. Document order is the
//! backup order.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::InventoryError;
use crate::models::DeviceDescriptor;

#[derive(Debug, Deserialize)]
struct InventoryDocument {
    devices: Vec<DeviceDescriptor>,
}

#[derive(Debug, Clone)]
pub struct DeviceInventory {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceInventory {
    /// Read and validate an inventory file
    pub async fn load(path: &Path) -> Result<Self, InventoryError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| InventoryError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, InventoryError> {
        let doc: InventoryDocument = serde_json::from_str(raw)?;
        validate(&doc.devices)?;
        Ok(Self {
            devices: doc.devices,
        })
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Report the first entry that cannot be backed up
fn validate(devices: &[DeviceDescriptor]) -> Result<(), InventoryError> {
    let mut seen = HashSet::new();

    for (index, dev) in devices.iter().enumerate() {
        let reject = |reason: &str| InventoryError::Format {
            index,
            hostname: if dev.hostname.trim().is_empty() {
                "<unnamed>".to_string()
            } else {
                dev.hostname.clone()
            },
            reason: reason.to_string(),
        };

        if dev.hostname.trim().is_empty() {
            return Err(reject("missing hostname"));
        }
        if dev.ip_address.trim().is_empty() {
            return Err(reject("missing ip_address"));
        }
        if dev.device_type.trim().is_empty() {
            return Err(reject("missing device_type"));
        }
        // Hostnames name output files
        if dev.hostname.contains(['/', '\\']) || dev.hostname == "." || dev.hostname == ".." {
            return Err(reject("hostname is not usable as a file name"));
        }
        if !seen.insert(dev.hostname.as_str()) {
            return Err(reject("duplicate hostname"));
        }
    }

    Ok(())
}
