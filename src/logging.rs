//! Tracing subscriber setup
//!
//! Stdout always; with `logging.dir` set, a second plain-text layer appends
//! to `netconfig_backup_{YYYY-MM-DD}.log` in that directory.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "netconfig_backup=info";

pub fn log_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("netconfig_backup_{}.log", date.format("%Y-%m-%d")))
}

pub fn init(config: &LoggingConfig, date: NaiveDate) -> anyhow::Result<Option<PathBuf>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .filter
            .as_deref()
            .unwrap_or(DEFAULT_FILTER)
            .into()
    });

    let (file_layer, file_path) = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = log_file_path(dir, date);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(file_path)
}
