//! JSON report of permanent failures, for re-queuing.
//!
//! ```json
//! {
//!   "generated_at": "2026-10-19T08:30:00+03:00",
//!   "total": 120,
//!   "succeeded": 117,
//!   "failures": [
//!     { "url": "https://…", "attempts": 4, "reason": "retries exhausted, last error: HTTP 503" }
//!   ]
//! }
//! ```

use crate::scheduler::RunSummary;
use chrono::Local;
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub generated_at: String,
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Serialize)]
pub struct FailureEntry {
    pub url: String,
    pub attempts: u32,
    pub reason: String,
}

impl FailureReport {
    pub fn from_summary(summary: &RunSummary) -> Self {
        let failures = summary
            .failures()
            .filter_map(|r| {
                r.failure_reason().map(|reason| FailureEntry {
                    url: r.url().to_string(),
                    attempts: r.attempts(),
                    reason: reason.to_string(),
                })
            })
            .collect();

        Self {
            generated_at: Local::now().to_rfc3339(),
            total: summary.total,
            succeeded: summary.succeeded(),
            failures,
        }
    }
}

/// Serialize the report as pretty JSON, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_failure_report(report: &FailureReport, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }
    fs::write(path, json).await?;
    info!(failures = report.failures.len(), "Wrote failure report");
    Ok(())
}
