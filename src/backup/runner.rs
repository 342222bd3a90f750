//! BackupRunner: one end-to-end backup run
//!
//! Credential first, then inventory, then every device strictly in inventory
//! order. Only the first two steps can abort the run; a device failure is
//! recorded in that device's result and the loop moves on.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tracing::Instrument;
use uuid::Uuid;

use super::storage::ConfigStore;
use crate::device::DeviceConnector;
use crate::error::RunError;
use crate::inventory::DeviceInventory;
use crate::models::{BackupResult, BackupStatus, Credential, DeviceDescriptor, RunSummary};
use crate::secrets::SecretProvider;

/// Paths a run reads from and writes to
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub inventory_path: PathBuf,
    pub output_dir: PathBuf,
}

pub struct BackupRunner {
    inventory_path: PathBuf,
    store: ConfigStore,
    secrets: Arc<dyn SecretProvider>,
    connector: Arc<dyn DeviceConnector>,
}

impl BackupRunner {
    pub fn new(
        settings: RunnerSettings,
        secrets: Arc<dyn SecretProvider>,
        connector: Arc<dyn DeviceConnector>,
    ) -> Self {
        Self {
            inventory_path: settings.inventory_path,
            store: ConfigStore::new(settings.output_dir),
            secrets,
            connector,
        }
    }

    /// Run with today's local date as the file stamp
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        self.run_for_date(Local::now().date_naive()).await
    }

    pub async fn run_for_date(&self, run_date: NaiveDate) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("backup_run", %run_id);
        self.execute(run_id, run_date).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, run_date: NaiveDate) -> Result<RunSummary, RunError> {
        let started_at = Utc::now();
        tracing::info!("Starting network device backup run for {}", run_date);

        // 1. Credential
        let credential = match self.secrets.fetch_credential().await {
            Ok(c) => {
                tracing::info!("Credential retrieved from {}", self.secrets.name());
                c
            }
            Err(e) => {
                tracing::error!("Could not retrieve credentials: {}", e);
                return Err(e.into());
            }
        };

        // 2. Inventory
        let inventory = match DeviceInventory::load(&self.inventory_path).await {
            Ok(inv) => {
                tracing::info!(
                    "Loaded {} devices from {}",
                    inv.len(),
                    self.inventory_path.display()
                );
                inv
            }
            Err(e) => {
                tracing::error!("Could not load inventory: {}", e);
                return Err(e.into());
            }
        };

        // 3. Devices, sequentially
        if let Err(e) = self.store.ensure_dir().await {
            tracing::error!(
                "Cannot create output directory {}: {}",
                self.store.output_dir().display(),
                e
            );
        }

        let mut results = Vec::with_capacity(inventory.len());
        for device in inventory.devices() {
            let result = self.backup_device(device, &credential, run_date).await;
            results.push(result);
        }

        let summary = RunSummary {
            run_id,
            run_date,
            started_at,
            finished_at: Utc::now(),
            results,
        };

        if summary.failed() == 0 {
            tracing::info!(
                "Backup run completed: {}/{} devices backed up",
                summary.succeeded(),
                summary.results.len()
            );
        } else {
            tracing::warn!(
                "Backup run completed with failures: {}/{} devices backed up, {} failed",
                summary.succeeded(),
                summary.results.len(),
                summary.failed()
            );
        }

        Ok(summary)
    }

    /// Fetch and persist one device; never fails past this boundary
    pub async fn backup_device(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
        run_date: NaiveDate,
    ) -> BackupResult {
        tracing::info!(
            "Connecting to device {} at {} ({}{})",
            device.hostname,
            device.address(),
            device.device_type,
            device
                .vendor
                .as_deref()
                .map(|v| format!(", {}", v))
                .unwrap_or_default()
        );

        let config = match self.connector.fetch_config(device, credential).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to back up {}: {}", device.hostname, e);
                return BackupResult::failure(&device.hostname, e.status(), e.to_string());
            }
        };

        match self.store.save(&device.hostname, run_date, &config).await {
            Ok(path) => {
                tracing::info!(
                    "Successfully backed up configuration for {} ({} bytes) to {}",
                    device.hostname,
                    config.len(),
                    path.display()
                );
                BackupResult::success(&device.hostname, path)
            }
            Err(e) => {
                tracing::error!(
                    "Fetched configuration for {} but could not write it: {}",
                    device.hostname,
                    e
                );
                BackupResult::failure(
                    &device.hostname,
                    BackupStatus::OtherError,
                    format!("write failed: {}", e),
                )
            }
        }
    }
}
