//! Bounded-concurrency driver over the whole URL list.
//!
//! # Scheduling
//!
//! URLs are fed through `futures::stream::buffer_unordered`, which keeps at
//! most `concurrency` [`DownloadTask`]s in flight and admits the next URL
//! only when a slot frees up. Each task runs its own retry loop to completion
//! before its slot is reused. Start and completion order are unspecified.
//!
//! # Cancellation
//!
//! Cancelling the token stops admission immediately. Tasks already in flight
//! are not aborted: a running fetch finishes on its own, while tasks that are
//! sleeping (jitter or backoff) wake up and report `Cancelled`. `run_all`
//! then returns with the URLs that never started counted as `not_started`.
//!
//! # Shared state
//!
//! Only the proxy cursor (inside the fetcher) and the [`ProgressCounter`] are
//! shared between tasks, and both are updated in short critical sections.

use crate::error::FailureReason;
use crate::fetch::Fetch;
use crate::models::TaskResult;
use crate::retry::RetryPolicy;
use crate::task::DownloadTask;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Default number of concurrent downloads.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Process exit status of an interrupted run (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;

/// Successful downloads out of the run total.
#[derive(Debug)]
pub struct ProgressCounter {
    completed: AtomicUsize,
    total: usize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one success and return `(completed, total)` after it.
    ///
    /// `completed` never exceeds `total` and never decreases.
    pub fn increment(&self) -> (usize, usize) {
        let total = self.total;
        let previous = self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| (c < total).then_some(c + 1))
            .unwrap_or(total);
        ((previous + 1).min(total), total)
    }

    pub fn snapshot(&self) -> (usize, usize) {
        (self.completed.load(Ordering::Acquire), self.total)
    }

    /// Percentage in `[0, 100]`; an empty run counts as complete.
    pub fn percent(completed: usize, total: usize) -> f64 {
        if total == 0 {
            return 100.0;
        }
        completed as f64 / total as f64 * 100.0
    }
}

/// Everything a caller needs after `run_all` returns.
#[derive(Debug)]
pub struct RunSummary {
    pub total: usize,
    /// One entry per URL that started, in completion order.
    pub results: Vec<TaskResult>,
    /// URLs never admitted because the run was cancelled.
    pub not_started: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Permanent failures (exhausted retries or storage errors).
    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| {
            matches!(
                r,
                TaskResult::Failure { reason, .. } if *reason != FailureReason::Cancelled
            )
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// `130` if cancelled, else `1` on any permanent failure, else `0`.
    pub fn exit_status(&self) -> u8 {
        if self.cancelled {
            EXIT_INTERRUPTED
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }
}

/// Runs [`DownloadTask`]s over a URL list with bounded concurrency.
pub struct Scheduler<'a, F> {
    fetcher: &'a F,
    policy: RetryPolicy,
    download_dir: PathBuf,
    cancel: CancellationToken,
}

impl<'a, F: Fetch> Scheduler<'a, F> {
    pub fn new(
        fetcher: &'a F,
        policy: RetryPolicy,
        download_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            policy,
            download_dir: download_dir.into(),
            cancel,
        }
    }

    /// Download every URL, at most `concurrency` at a time.
    ///
    /// Returns once every admitted URL has a terminal result. Without
    /// cancellation there is exactly one result per input URL.
    #[instrument(level = "info", skip_all, fields(total = urls.len(), concurrency = concurrency))]
    pub async fn run_all(&self, urls: &[String], concurrency: usize) -> RunSummary {
        let t0 = Instant::now();
        let total = urls.len();
        let progress = ProgressCounter::new(total);
        let task = DownloadTask::new(
            self.fetcher,
            &self.policy,
            &self.download_dir,
            &progress,
            &self.cancel,
        );

        info!(total, concurrency, "Starting downloads");

        let results: Vec<TaskResult> = stream::iter(urls)
            .take_while(|_| std::future::ready(!self.cancel.is_cancelled()))
            .map(|url| task.run(url))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let cancelled = self.cancel.is_cancelled();
        let summary = RunSummary {
            total,
            not_started: total - results.len(),
            results,
            cancelled,
            elapsed: t0.elapsed(),
        };

        if cancelled {
            warn!(
                started = summary.results.len(),
                not_started = summary.not_started,
                "Run cancelled"
            );
        }
        info!(
            total,
            succeeded = summary.succeeded(),
            failed = summary.failures().count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Downloads finished"
        );
        summary
    }
}
