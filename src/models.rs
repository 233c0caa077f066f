//! Data models for proxy credentials, fetch results and per-URL outcomes.
//!
//! This module defines the core data structures used throughout the harvester:
//! - [`ProxyCredential`]: one upstream proxy as loaded from the proxy file
//! - [`FetchResponse`] / [`FetchOutcome`]: the result of a single HTTP attempt
//! - [`DownloadRequest`]: the per-URL state carried through the retry loop
//! - [`TaskResult`]: the terminal outcome of one URL

use crate::error::{FailureReason, FetchError};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Credentials for one upstream HTTP proxy.
///
/// The proxy file spells the fields `user` and `pass`; `port` may be written
/// either as a JSON string or a number.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ProxyCredential {
    pub host: String,
    #[serde(deserialize_with = "port_from_string_or_number")]
    pub port: u16,
    #[serde(rename = "user")]
    pub username: String,
    #[serde(rename = "pass")]
    pub password: String,
}

impl ProxyCredential {
    /// `http://host:port`. Credentials are attached separately as basic auth.
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

// Passwords stay out of logs.
impl fmt::Debug for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Display for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn port_from_string_or_number<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(n) => Ok(n),
        RawPort::Text(s) => s
            .trim()
            .parse::<u16>()
            .map_err(|e| serde::de::Error::custom(format!("invalid port {s:?}: {e}"))),
    }
}

/// A 2xx response with its body fully buffered.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Raw `Content-Type` header value, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Result of one fetch attempt: `Ok` is the Success case, `Err` carries the
/// HttpError / TransportError split.
pub type FetchOutcome = Result<FetchResponse, FetchError>;

/// Per-URL state for the retry loop.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub destination_dir: PathBuf,
    /// Retries already performed; 0 while the first attempt is in flight.
    pub attempt_count: u32,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, destination_dir: &Path) -> Self {
        Self {
            url: url.into(),
            destination_dir: destination_dir.to_path_buf(),
            attempt_count: 0,
        }
    }

    /// Total attempts made once the current one has finished.
    pub fn attempts(&self) -> u32 {
        self.attempt_count + 1
    }
}

/// Terminal outcome of one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    Success {
        url: String,
        path: PathBuf,
        attempts: u32,
    },
    Failure {
        url: String,
        attempts: u32,
        reason: FailureReason,
    },
}

impl TaskResult {
    pub fn url(&self) -> &str {
        match self {
            TaskResult::Success { url, .. } | TaskResult::Failure { url, .. } => url,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            TaskResult::Success { attempts, .. } | TaskResult::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            TaskResult::Failure { reason, .. } => Some(reason),
            TaskResult::Success { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_accepts_string_port() {
        let json = r#"{"host": "10.0.0.1", "port": "8080", "user": "u", "pass": "p"}"#;
        let cred: ProxyCredential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.port, 8080);
        assert_eq!(cred.username, "u");
        assert_eq!(cred.password, "p");
    }

    #[test]
    fn test_credential_accepts_numeric_port() {
        let json = r#"{"host": "10.0.0.1", "port": 3128, "user": "u", "pass": "p"}"#;
        let cred: ProxyCredential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.port, 3128);
        assert_eq!(cred.proxy_url(), "http://10.0.0.1:3128");
    }

    #[test]
    fn test_credential_rejects_bad_port() {
        let json = r#"{"host": "h", "port": "eighty", "user": "u", "pass": "p"}"#;
        assert!(serde_json::from_str::<ProxyCredential>(json).is_err());
    }

    #[test]
    fn test_credential_missing_field() {
        let json = r#"{"host": "h", "port": 80, "user": "u"}"#;
        assert!(serde_json::from_str::<ProxyCredential>(json).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let cred = ProxyCredential {
            host: "h".into(),
            port: 1,
            username: "u".into(),
            password: "hunter2".into(),
        };
        let dbg = format!("{cred:?}");
        assert!(!dbg.contains("hunter2"));
        assert_eq!(cred.to_string(), "h:1");
    }

    #[test]
    fn test_request_attempts() {
        let mut req = DownloadRequest::new("https://example.org/a", Path::new("/tmp"));
        assert_eq!(req.attempts(), 1);
        req.attempt_count = 3;
        assert_eq!(req.attempts(), 4);
    }
}
