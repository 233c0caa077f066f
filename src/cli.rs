//! Command-line interface definitions for Article Harvester.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Values left unset here fall back to the YAML config file, then to the
//! built-in defaults (see [`crate::config`]).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Article Harvester application.
///
/// # Examples
///
/// ```sh
/// # Download every URL in urls.txt through the proxies in proxies.json
/// article_harvester fetch -u urls.txt -p proxies.json -d downloads
///
/// # Slower and politer
/// article_harvester fetch -u urls.txt -w 4 --randomized-delay
///
/// # Build listing-page URLs from a publishers file
/// article_harvester pages --publishers publishers.json -o urls.txt
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every URL in a list
    Fetch(FetchArgs),
    /// Expand publishers into paginated listing URLs
    Pages(PagesArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// File with one URL per line
    #[arg(short, long)]
    pub url_list: PathBuf,

    /// JSON proxy file (`{"proxies": [{host, port, user, pass}]}`)
    #[arg(short, long, env = "HARVEST_PROXY_FILE")]
    pub proxy: Option<PathBuf>,

    /// Download directory (created if absent)
    #[arg(short, long)]
    pub download_dir: Option<PathBuf>,

    /// Maximum number of concurrent downloads
    #[arg(short = 'w', long)]
    pub max_workers: Option<usize>,

    /// Maximum number of retries per URL
    #[arg(short = 'r', long)]
    pub max_retries: Option<u32>,

    /// Linear retry backoff unit in seconds
    #[arg(short = 'b', long)]
    pub retry_backoff: Option<f64>,

    /// Sleep a random interval before every attempt
    #[arg(long)]
    pub randomized_delay: bool,

    /// Lower jitter bound in seconds
    #[arg(long)]
    pub jitter_min: Option<f64>,

    /// Upper jitter bound in seconds
    #[arg(long)]
    pub jitter_max: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Drop repeated URLs (keeps first occurrence)
    #[arg(long)]
    pub dedup: bool,

    /// Write permanent failures to this JSON file
    #[arg(long)]
    pub failure_report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PagesArgs {
    /// JSON array of `{name, url, article_count}`
    #[arg(long)]
    pub publishers: PathBuf,

    /// Scheme and host prepended to each publisher's search path
    #[arg(long, default_value = "https://dergipark.org.tr")]
    pub prefix: String,

    /// Output file, one URL per line
    #[arg(short, long, default_value = "urls.txt")]
    pub output: PathBuf,
}
