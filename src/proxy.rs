//! Round-robin pool of upstream proxy credentials.
//!
//! The pool is loaded once per run and shared by every in-flight fetch. Only
//! the selection step is serialized: [`ProxyPool::next`] takes a short lock to
//! read and advance the cursor, and the credential it returns may be in use by
//! several requests at the same time.
//!
//! An empty pool is a normal state meaning "connect directly".
//!
//! # Proxy file format
//!
//! ```json
//! {
//!   "proxies": [
//!     { "host": "203.0.113.7", "port": "8080", "user": "alice", "pass": "secret" }
//!   ]
//! }
//! ```

use crate::error::ConfigError;
use crate::models::ProxyCredential;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, instrument, warn};

#[derive(Deserialize)]
struct ProxyFile {
    proxies: Vec<ProxyCredential>,
}

#[derive(Debug, Default)]
struct PoolState {
    proxies: Vec<ProxyCredential>,
    /// Index of the credential served last; `None` until the first `next()`.
    cursor: Option<usize>,
}

/// Ordered proxy credentials plus a circular cursor.
#[derive(Debug, Default)]
pub struct ProxyPool {
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// An empty pool (direct connections).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from already-parsed credentials.
    pub fn with_credentials(credentials: Vec<ProxyCredential>) -> Result<Self, ConfigError> {
        let pool = Self::new();
        pool.load(credentials)?;
        Ok(pool)
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // The state is a Vec and an index; a panic while holding the lock
        // cannot leave it half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the pool contents and reset the cursor.
    ///
    /// Every entry is validated first. On error the pool is left empty, never
    /// partially populated.
    pub fn load(&self, credentials: Vec<ProxyCredential>) -> Result<usize, ConfigError> {
        let validated = validate(credentials);
        let mut state = self.lock();
        state.cursor = None;
        match validated {
            Ok(proxies) => {
                let count = proxies.len();
                state.proxies = proxies;
                Ok(count)
            }
            Err(e) => {
                state.proxies.clear();
                Err(e)
            }
        }
    }

    /// Load credentials from a JSON proxy file.
    ///
    /// A missing file, malformed JSON, a missing `proxies` key or an entry
    /// lacking a field all return `ConfigError` and leave the pool empty.
    #[instrument(level = "info", skip(self), fields(path = %path.display()))]
    pub fn load_file(&self, path: &Path) -> Result<usize, ConfigError> {
        let parsed = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|raw| {
                serde_json::from_str::<ProxyFile>(&raw).map_err(|source| ConfigError::ProxyFile {
                    path: path.to_path_buf(),
                    source,
                })
            });

        match parsed {
            Ok(file) => {
                let count = self.load(file.proxies)?;
                info!(count, "Loaded proxies");
                Ok(count)
            }
            Err(e) => {
                self.clear();
                warn!(error = %e, "Proxy file rejected; pool is empty");
                Err(e)
            }
        }
    }

    /// Drop every credential (direct-connection mode).
    pub fn clear(&self) {
        let mut state = self.lock();
        state.proxies.clear();
        state.cursor = None;
    }

    /// Next credential in round-robin order, or `None` for a direct connection.
    pub fn next(&self) -> Option<ProxyCredential> {
        let mut state = self.lock();
        if state.proxies.is_empty() {
            return None;
        }
        let index = match state.cursor {
            Some(last) => (last + 1) % state.proxies.len(),
            None => 0,
        };
        state.cursor = Some(index);
        Some(state.proxies[index].clone())
    }

    pub fn len(&self) -> usize {
        self.lock().proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate(credentials: Vec<ProxyCredential>) -> Result<Vec<ProxyCredential>, ConfigError> {
    for (index, cred) in credentials.iter().enumerate() {
        if cred.host.trim().is_empty() {
            return Err(ConfigError::ProxyEntry {
                index,
                reason: "empty host".into(),
            });
        }
        if cred.port == 0 {
            return Err(ConfigError::ProxyEntry {
                index,
                reason: "port 0".into(),
            });
        }
    }
    Ok(credentials)
}

#[cfg(test)]
pub(crate) fn credential(host: &str, port: u16) -> ProxyCredential {
    ProxyCredential {
        host: host.to_string(),
        port,
        username: "user".to_string(),
        password: "pass".to_string(),
    }
}
