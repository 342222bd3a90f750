//! Run summary and process exit policy
//!
//! Exit status: 0 when every device was backed up (an empty inventory
//! included), 1 when any device failed, 2 when the run aborted before the
//! device loop.

use std::fmt::Write;

use crate::error::RunError;
use crate::models::RunSummary;

pub const EXIT_OK: u8 = 0;
pub const EXIT_DEVICE_FAILURE: u8 = 1;
pub const EXIT_ABORTED: u8 = 2;

pub fn exit_code(outcome: &Result<RunSummary, RunError>) -> u8 {
    match outcome {
        Ok(summary) if summary.failed() == 0 => EXIT_OK,
        Ok(_) => EXIT_DEVICE_FAILURE,
        Err(_) => EXIT_ABORTED,
    }
}

/// Plain-text table of per-device outcomes
pub fn render(summary: &RunSummary) -> String {
    let width = summary
        .results
        .iter()
        .map(|r| r.hostname.len())
        .max()
        .unwrap_or(0)
        .max("HOSTNAME".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Backup run {} ({}): {}/{} succeeded",
        summary.run_id,
        summary.run_date,
        summary.succeeded(),
        summary.results.len()
    );
    let _ = writeln!(out, "{:<width$}  {:<15}  DETAIL", "HOSTNAME", "STATUS");

    for result in &summary.results {
        let detail = match (&result.saved_path, &result.error_detail) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(err)) => err.clone(),
            (None, None) => String::new(),
        };
        let _ = writeln!(
            out,
            "{:<width$}  {:<15}  {}",
            result.hostname,
            result.status.to_string(),
            detail
        );
    }

    out
}
