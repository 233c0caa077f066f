//! One URL to one file: fetch, retry, persist, report progress.

use crate::error::FailureReason;
use crate::fetch::Fetch;
use crate::models::{DownloadRequest, FetchResponse, TaskResult};
use crate::retry::RetryPolicy;
use crate::scheduler::ProgressCounter;
use crate::utils::{destination_path, truncate_for_log};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Borrowed view of the run-wide state a task needs.
pub struct DownloadTask<'a, F> {
    fetcher: &'a F,
    policy: &'a RetryPolicy,
    download_dir: &'a Path,
    progress: &'a ProgressCounter,
    cancel: &'a CancellationToken,
}

impl<'a, F: Fetch> DownloadTask<'a, F> {
    pub fn new(
        fetcher: &'a F,
        policy: &'a RetryPolicy,
        download_dir: &'a Path,
        progress: &'a ProgressCounter,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            policy,
            download_dir,
            progress,
            cancel,
        }
    }

    /// Drive one URL to a terminal result.
    ///
    /// Retries are a bounded loop: at most `max_retries + 1` fetches. Once the
    /// run is cancelled no further attempt starts, but a fetch already in
    /// flight is allowed to finish.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn run(&self, url: &str) -> TaskResult {
        let mut request = DownloadRequest::new(url, self.download_dir);

        loop {
            if let Some(delay) = self.policy.jitter_delay() {
                debug!(?delay, "Jitter before attempt");
                if !self.pause(delay).await {
                    return cancelled(&request, request.attempt_count);
                }
            }

            let outcome = self.fetcher.fetch(&request.url).await;
            if !self.policy.should_retry(request.attempt_count, &outcome) {
                return match outcome {
                    Ok(response) => self.persist(&request, response).await,
                    Err(e) => {
                        let attempts = request.attempts();
                        error!(url = %request.url, attempts, error = %e, "Giving up");
                        TaskResult::Failure {
                            url: request.url,
                            attempts,
                            reason: FailureReason::Exhausted(e),
                        }
                    }
                };
            }

            let retry = request.attempt_count + 1;
            let delay = self.policy.backoff_delay(retry);
            if let Err(e) = &outcome {
                warn!(
                    url = %request.url,
                    retry,
                    max = self.policy.max_retries,
                    ?delay,
                    error = %truncate_for_log(&e.to_string(), 300),
                    "Attempt failed; backing off"
                );
            }
            if !self.pause(delay).await {
                return cancelled(&request, request.attempts());
            }
            request.attempt_count = retry;
        }
    }

    /// Sleep unless the run is cancelled first. Returns false on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = sleep(delay) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    async fn persist(&self, request: &DownloadRequest, response: FetchResponse) -> TaskResult {
        let path = destination_path(
            &request.destination_dir,
            &request.url,
            response.content_type(),
        );

        if let Err(e) = write_atomically(&path, &response.body).await {
            error!(url = %request.url, path = %path.display(), error = %e, "Write failed");
            return TaskResult::Failure {
                url: request.url.clone(),
                attempts: request.attempts(),
                reason: FailureReason::Storage {
                    path,
                    message: e.to_string(),
                },
            };
        }

        let (completed, total) = self.progress.increment();
        info!(
            url = %request.url,
            path = %path.display(),
            status = response.status.as_u16(),
            bytes = response.body.len(),
            "Downloaded"
        );
        info!(
            completed,
            total,
            percent = %format!("{:.2}", ProgressCounter::percent(completed, total)),
            "Progress"
        );

        TaskResult::Success {
            url: request.url.clone(),
            path,
            attempts: request.attempts(),
        }
    }
}

fn cancelled(request: &DownloadRequest, attempts: u32) -> TaskResult {
    info!(url = %request.url, attempts, "Cancelled before next attempt");
    TaskResult::Failure {
        url: request.url.clone(),
        attempts,
        reason: FailureReason::Cancelled,
    }
}

/// Write `body` next to `path` and rename it into place, so readers see
/// either the old complete file or the new one. Existing files are replaced.
///
/// Every call gets its own temp file, so concurrent writers of one
/// destination never rename each other's partial away; the last rename wins.
async fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(path);
    if let Err(e) = fs::write(&partial, body).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&partial, path).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }
    Ok(())
}

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// `<name>.<pid>.<seq>.part`, unique per write within and across processes.
fn partial_path(path: &Path) -> PathBuf {
    let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{seq}.part", std::process::id()));
    path.with_file_name(name)
}
