//! Run configuration: built-in defaults, an optional YAML file, CLI overrides.
//!
//! # YAML format
//!
//! Every key is optional; missing keys keep their defaults.
//!
//! ```yaml
//! max_workers: 20
//! max_retries: 3
//! retry_backoff_base: 0.5
//! randomized_delay: false
//! jitter_min: 0.1
//! jitter_max: 0.69
//! download_dir: downloads
//! request_timeout: 30
//! proxy_file: proxies.json
//! ```

use crate::cli::FetchArgs;
use crate::error::ConfigError;
use crate::retry::{JitterRange, RetryPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    pub max_workers: usize,
    pub max_retries: u32,
    /// Seconds.
    pub retry_backoff_base: f64,
    pub randomized_delay: bool,
    /// Seconds.
    pub jitter_min: f64,
    /// Seconds.
    pub jitter_max: f64,
    pub download_dir: PathBuf,
    /// Seconds per attempt.
    pub request_timeout: f64,
    pub proxy_file: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_workers: crate::scheduler::DEFAULT_CONCURRENCY,
            max_retries: 3,
            retry_backoff_base: 0.5,
            randomized_delay: false,
            jitter_min: 0.1,
            jitter_max: 0.69,
            download_dir: PathBuf::from("downloads"),
            request_timeout: 30.0,
            proxy_file: None,
        }
    }
}

impl HarvestConfig {
    /// Read a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then `--config` if given, then explicit flags. Validated.
    pub fn resolve(args: &FetchArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, args: &FetchArgs) {
        if let Some(v) = args.max_workers {
            self.max_workers = v;
        }
        if let Some(v) = args.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = args.retry_backoff {
            self.retry_backoff_base = v;
        }
        if args.randomized_delay {
            self.randomized_delay = true;
        }
        if let Some(v) = args.jitter_min {
            self.jitter_min = v;
        }
        if let Some(v) = args.jitter_max {
            self.jitter_max = v;
        }
        if let Some(v) = &args.download_dir {
            self.download_dir = v.clone();
        }
        if let Some(v) = args.timeout {
            self.request_timeout = v;
        }
        if let Some(v) = &args.proxy {
            self.proxy_file = Some(v.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(invalid("max_workers", "must be at least 1"));
        }
        seconds("retry_backoff_base", self.retry_backoff_base)?;
        let jitter_min = seconds("jitter_min", self.jitter_min)?;
        let jitter_max = seconds("jitter_max", self.jitter_max)?;
        if jitter_min > jitter_max {
            return Err(invalid(
                "jitter_min",
                format!("{} exceeds jitter_max {}", self.jitter_min, self.jitter_max),
            ));
        }
        if seconds("request_timeout", self.request_timeout)?.is_zero() {
            return Err(invalid("request_timeout", "must be a positive number of seconds"));
        }
        Ok(())
    }

    /// Only meaningful on a validated config; out-of-range values saturate.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: saturating_secs(self.retry_backoff_base),
            jitter: self.randomized_delay.then(|| JitterRange {
                min: saturating_secs(self.jitter_min),
                max: saturating_secs(self.jitter_max),
            }),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        saturating_secs(self.request_timeout)
    }
}

fn invalid(option: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        option,
        reason: reason.into(),
    }
}

/// Parse a seconds value the way `Duration` can hold it.
fn seconds(option: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| invalid(option, format!("{value} is not a usable number of seconds: {e}")))
}

fn saturating_secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 { Duration::MAX } else { Duration::ZERO })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::io::Write;

    fn fetch_args(argv: &[&str]) -> FetchArgs {
        let mut full = vec!["article_harvester", "fetch"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Fetch(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::resolve(&fetch_args(&["-u", "urls.txt"])).unwrap();
        assert_eq!(config, HarvestConfig::default());
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_backoff, Duration::from_millis(500));
        assert!(policy.jitter.is_none());
        assert_eq!(config.max_workers, 20);
    }

    #[test]
    fn test_yaml_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_workers: 8\nmax_retries: 5\nrandomized_delay: true\njitter_max: 1.5\ndownload_dir: /data/html"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config =
            HarvestConfig::resolve(&fetch_args(&["-u", "urls.txt", "-c", path, "-w", "4"])).unwrap();
        assert_eq!(config.max_workers, 4, "flag wins over file");
        assert_eq!(config.max_retries, 5, "file wins over default");
        assert_eq!(config.download_dir, PathBuf::from("/data/html"));
        let jitter = config.retry_policy().jitter.unwrap();
        assert_eq!(jitter.min, Duration::from_millis(100));
        assert_eq!(jitter.max, Duration::from_millis(1500));
    }

    #[test]
    fn test_unknown_yaml_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_wrokers: 8").unwrap();
        let err = HarvestConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigFile { .. }));
    }

    #[test]
    fn test_missing_config_file() {
        let err = HarvestConfig::from_file(Path::new("/nonexistent/harvest.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = HarvestConfig::resolve(&fetch_args(&["-u", "u", "-w", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { option: "max_workers", .. }));
    }

    #[test]
    fn test_rejects_inverted_jitter() {
        let err = HarvestConfig::resolve(&fetch_args(&[
            "-u",
            "u",
            "--jitter-min",
            "2",
            "--jitter-max",
            "1",
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { option: "jitter_min", .. }));
    }

    #[test]
    fn test_rejects_unrepresentable_seconds() {
        for argv in [
            ["-u", "u", "--timeout", "1e20"],
            ["-u", "u", "-b", "1e20"],
            ["-u", "u", "--jitter-max", "1e300"],
        ] {
            let err = HarvestConfig::resolve(&fetch_args(&argv)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{argv:?}: {err}");
        }

        let config = HarvestConfig {
            request_timeout: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { option: "request_timeout", .. })
        ));
    }

    #[test]
    fn test_unvalidated_values_do_not_panic() {
        let config = HarvestConfig {
            request_timeout: 1e20,
            retry_backoff_base: -1.0,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), Duration::MAX);
        assert_eq!(config.retry_policy().base_backoff, Duration::ZERO);
    }

    #[test]
    fn test_sub_millisecond_jitter_kept() {
        let config = HarvestConfig {
            randomized_delay: true,
            jitter_min: 0.0005,
            jitter_max: 0.0005,
            ..Default::default()
        };
        config.validate().unwrap();
        let jitter = config.retry_policy().jitter.unwrap();
        assert_eq!(jitter.min, Duration::from_micros(500));
    }

    #[test]
    fn test_rejects_negative_backoff() {
        let config = HarvestConfig {
            retry_backoff_base: -0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = HarvestConfig {
            request_timeout: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
