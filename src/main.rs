//! # Article Harvester
//!
//! Downloads article landing pages and PDFs from a scholarly-article portal
//! through a rotating pool of upstream HTTP proxies.
//!
//! ## Features
//!
//! - Round-robin proxy rotation from a JSON credential file, falling back to
//!   direct connections when the file is missing or invalid
//! - Bounded concurrent downloads (20 at a time by default)
//! - Linear retry backoff and an optional randomized politeness delay
//! - Content-addressed output: one file per URL, named from the URL slug and
//!   the response content type
//! - Ctrl-C stops admitting new URLs and returns once in-flight work settles
//!
//! ## Usage
//!
//! ```sh
//! article_harvester pages --publishers publishers.json -o listing_urls.txt
//! article_harvester fetch -u listing_urls.txt -p proxies.json -d listing_html
//! ```
//!
//! ## Exit status
//!
//! `0` when every URL was saved, `1` when any URL failed permanently, `130`
//! when the run was interrupted.

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod fetch;
mod listing;
mod models;
mod proxy;
mod report;
mod retry;
mod scheduler;
mod task;
mod url_list;
mod utils;

#[cfg(test)]
mod test_server;

use cli::{Cli, Command, FetchArgs, PagesArgs};
use config::HarvestConfig;
use fetch::FetchClient;
use proxy::ProxyPool;
use report::{FailureReport, write_failure_report};
use scheduler::Scheduler;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("article_harvester starting up");

    let args = Cli::parse();
    let code = match args.command {
        Command::Fetch(fetch_args) => run_fetch(fetch_args).await?,
        Command::Pages(pages_args) => run_pages(pages_args).await?,
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(code)
}

#[instrument(level = "info", skip_all)]
async fn run_fetch(args: FetchArgs) -> Result<ExitCode, Box<dyn Error>> {
    let config = HarvestConfig::resolve(&args)?;
    info!(
        max_workers = config.max_workers,
        max_retries = config.max_retries,
        retry_backoff_base = config.retry_backoff_base,
        randomized_delay = config.randomized_delay,
        download_dir = %config.download_dir.display(),
        "Resolved configuration"
    );

    // Early check: nothing is fetched into a directory we cannot write.
    if let Err(e) = ensure_writable_dir(&config.download_dir).await {
        error!(
            path = %config.download_dir.display(),
            error = %e,
            "Download directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let urls = url_list::read_url_list(&args.url_list, args.dedup).await?;

    let pool = ProxyPool::new();
    match &config.proxy_file {
        Some(path) => {
            if let Err(e) = pool.load_file(path) {
                warn!(error = %e, "Continuing with direct connections");
            }
        }
        None => info!("No proxy file configured; using direct connections"),
    }
    let fetcher = FetchClient::new(pool, config.request_timeout())?;
    if !fetcher.pool().is_empty() {
        info!(proxies = fetcher.pool().len(), "Rotating through proxies");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight downloads, admitting no new ones");
            on_interrupt.cancel();
        }
    });

    let scheduler = Scheduler::new(
        &fetcher,
        config.retry_policy(),
        config.download_dir.clone(),
        cancel,
    );
    let summary = scheduler.run_all(&urls, config.max_workers).await;

    for failure in summary.failures() {
        if let Some(reason) = failure.failure_reason() {
            error!(url = failure.url(), attempts = failure.attempts(), %reason, "Permanent failure");
        }
    }

    if let Some(path) = &args.failure_report {
        let report = FailureReport::from_summary(&summary);
        if let Err(e) = write_failure_report(&report, path).await {
            error!(path = %path.display(), error = %e, "Failed to write failure report");
        }
    }

    info!(
        total = summary.total,
        succeeded = summary.succeeded(),
        failed = summary.failures().count(),
        not_started = summary.not_started,
        cancelled = summary.cancelled,
        "Run summary"
    );

    Ok(ExitCode::from(summary.exit_status()))
}

#[instrument(level = "info", skip_all)]
async fn run_pages(args: PagesArgs) -> Result<ExitCode, Box<dyn Error>> {
    let publishers = listing::read_publishers(&args.publishers)?;
    let urls = listing::landing_urls(&args.prefix, &publishers)?;
    info!(
        publishers = publishers.len(),
        urls = urls.len(),
        "Expanded listing pages"
    );
    url_list::write_url_list(&args.output, &urls).await?;
    Ok(ExitCode::SUCCESS)
}
