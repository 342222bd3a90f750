//! netconfig-backup - Network Device Configuration Backup
//!
//! Fetches device credentials from Vault, then pulls the running
//! configuration of every inventory device over SSH into date-stamped files.

mod backup;
mod config;
mod device;
mod error;
mod inventory;
mod logging;
mod models;
mod secrets;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use crate::backup::summary::{self, EXIT_ABORTED};
use crate::backup::{BackupRunner, RunnerSettings};
use crate::device::SshDeviceConnector;
use crate::secrets::VaultClient;

#[derive(Parser, Debug)]
#[command(name = "netconfig-backup")]
#[command(about = "Back up network device running configurations over SSH.")]
struct Cli {
    /// Config file (without extension is fine); defaults to config/default
    #[arg(short, long)]
    config: Option<String>,
    /// Inventory JSON, overrides inventory.path
    #[arg(short, long)]
    inventory: Option<PathBuf>,
    /// Backup directory, overrides backup.output_dir
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Log file directory, overrides logging.dir
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match config::Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::from(EXIT_ABORTED);
        }
    };
    if let Some(path) = cli.inventory {
        config.inventory.path = path;
    }
    if let Some(dir) = cli.output_dir {
        config.backup.output_dir = dir;
    }
    if let Some(dir) = cli.log_dir {
        config.logging.dir = Some(dir);
    }

    // Initialize tracing
    let today = chrono::Local::now().date_naive();
    match logging::init(&config.logging, today) {
        Ok(Some(path)) => tracing::info!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(EXIT_ABORTED);
        }
    }

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return ExitCode::from(EXIT_ABORTED);
    }
    tracing::info!("Configuration loaded");

    let vault = match VaultClient::new(&config.vault) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ABORTED);
        }
    };

    let runner = BackupRunner::new(
        RunnerSettings {
            inventory_path: config.inventory.path.clone(),
            output_dir: config.backup.output_dir.clone(),
        },
        Arc::new(vault),
        Arc::new(SshDeviceConnector::new(config.ssh.clone())),
    );

    let outcome = runner.run_for_date(today).await;
    match &outcome {
        Ok(run) => {
            print!("{}", summary::render(run));
            if run.failed() == 0 {
                tracing::info!("Network device backup automation completed successfully");
            } else {
                for failed in run.failures() {
                    tracing::warn!(
                        "{}: {} ({})",
                        failed.hostname,
                        failed.status,
                        failed.error_detail.as_deref().unwrap_or("no detail")
                    );
                }
                tracing::warn!("Network device backup automation completed with failures");
            }
        }
        Err(e) => {
            tracing::error!("Critical error in backup run: {}", e);
            tracing::error!("Network device backup automation failed");
        }
    }

    ExitCode::from(summary::exit_code(&outcome))
}
