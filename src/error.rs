//! Error types shared across the harvester.
//!
//! Errors are split by who sees them:
//! - [`ConfigError`]: problems loading proxy files, YAML config or option values
//! - [`FetchError`]: a single HTTP attempt that did not produce a 2xx body
//! - [`FailureReason`]: why a URL ended without a file on disk
//! - [`ListingError`]: malformed listing URLs handed to the paginator

use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be loaded or failed validation.
///
/// A proxy-file `ConfigError` is not fatal to a run: the pool is emptied and
/// the harvester continues with direct connections.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed proxy file {path}: {source}")]
    ProxyFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("proxy entry {index} is invalid: {reason}")]
    ProxyEntry { index: usize, reason: String },

    #[error("malformed config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid option `{option}`: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connect or read deadline elapsed.
    Timeout,
    /// DNS, refused connection, proxy handshake.
    Connect,
    /// Connection dropped while the body was streaming.
    Body,
    Other,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportKind::Timeout => "timeout",
            TransportKind::Connect => "connect",
            TransportKind::Body => "body",
            TransportKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A failed fetch attempt. Every variant is retryable; 4xx and 5xx are not
/// distinguished.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("transport error ({kind}): {cause}")]
    Transport { kind: TransportKind, cause: String },
}

/// Terminal reason for a URL that produced no file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// Every permitted attempt failed; carries the last attempt's error.
    #[error("retries exhausted, last error: {0}")]
    Exhausted(#[from] FetchError),

    /// The body was fetched but could not be written. Not retried.
    #[error("cannot write {path}: {message}")]
    Storage { path: PathBuf, message: String },

    #[error("cancelled by operator")]
    Cancelled,
}

/// Listing URL could not be paginated.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("search URL must contain exactly one `/search` segment: {0}")]
    MalformedSearchUrl(String),

    #[error("portal prefix is not an http(s) URL: {0}")]
    InvalidPrefix(String),

    #[error("cannot read publishers file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed publishers file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Http { status: 503 }.to_string(), "HTTP 503");
        let e = FetchError::Transport {
            kind: TransportKind::Timeout,
            cause: "operation timed out".into(),
        };
        assert_eq!(e.to_string(), "transport error (timeout): operation timed out");
    }

    #[test]
    fn test_failure_reason_wraps_last_error() {
        let reason: FailureReason = FetchError::Http { status: 500 }.into();
        assert_eq!(reason.to_string(), "retries exhausted, last error: HTTP 500");
    }
}
