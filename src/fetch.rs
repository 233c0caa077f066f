//! HTTP GET through the rotating proxy pool.
//!
//! # Architecture
//!
//! - [`Fetch`]: the seam the download tasks call. Tests swap in scripted fakes.
//! - [`FetchClient`]: the `reqwest` implementation. It owns the [`ProxyPool`]
//!   for the whole run and asks it for a credential on every attempt.
//!
//! # Proxy compatibility
//!
//! Upstream proxies are assumed to speak plain HTTP proxy protocol, so the
//! proxy URL is always `http://host:port` even when the target is `https://`.
//! HTTPS targets are tunnelled with `CONNECT` over that plain connection. A
//! proxy that itself requires TLS is not supported.

use crate::error::{FetchError, TransportKind};
use crate::models::{FetchOutcome, FetchResponse, ProxyCredential};
use crate::proxy::ProxyPool;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Something that can perform one GET attempt.
///
/// Implementations never fail out of band: every problem comes back as the
/// `Err` side of [`FetchOutcome`].
pub trait Fetch {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// `reqwest`-backed fetcher with per-proxy client caching.
pub struct FetchClient {
    pool: ProxyPool,
    direct: reqwest::Client,
    proxied: Mutex<HashMap<ProxyCredential, reqwest::Client>>,
    timeout: Duration,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("proxies", &self.pool.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FetchClient {
    /// Build a client around an already-loaded pool.
    ///
    /// `timeout` bounds each attempt from connect to the last body byte.
    pub fn new(pool: ProxyPool, timeout: Duration) -> Result<Self, reqwest::Error> {
        let direct = base_builder(timeout).no_proxy().build()?;
        Ok(Self {
            pool,
            direct,
            proxied: Mutex::new(HashMap::new()),
            timeout,
        })
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// Client routed through `proxy`, built on first use.
    fn client_for(&self, proxy: &ProxyCredential) -> Result<reqwest::Client, reqwest::Error> {
        let mut cache = self
            .proxied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = cache.get(proxy) {
            return Ok(client.clone());
        }
        let route = reqwest::Proxy::all(proxy.proxy_url())?.basic_auth(&proxy.username, &proxy.password);
        let client = base_builder(self.timeout).proxy(route).build()?;
        cache.insert(proxy.clone(), client.clone());
        Ok(client)
    }
}

fn base_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
}

impl Fetch for FetchClient {
    #[instrument(level = "debug", skip(self), fields(proxy = tracing::field::Empty))]
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let proxy = self.pool.next();
        let client = match &proxy {
            Some(p) => {
                tracing::Span::current().record("proxy", tracing::field::display(p));
                self.client_for(p).map_err(|e| transport_error(&e))?
            }
            None => self.direct.clone(),
        };

        let t0 = Instant::now();
        let response = client.get(url).send().await.map_err(|e| {
            let err = transport_error(&e);
            warn!(%url, elapsed_ms = t0.elapsed().as_millis() as u64, error = %err, "Request failed");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "Non-success status");
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| transport_error(&e))?;
        debug!(
            %url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );

        Ok(FetchResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Map a `reqwest` error into the transport taxonomy.
pub fn transport_error(e: &reqwest::Error) -> FetchError {
    let kind = if e.is_timeout() {
        TransportKind::Timeout
    } else if e.is_connect() {
        TransportKind::Connect
    } else if e.is_body() || e.is_decode() {
        TransportKind::Body
    } else {
        TransportKind::Other
    };
    FetchError::Transport {
        kind,
        cause: error_chain(e),
    }
}

/// `reqwest` keeps the useful part (refused, dns, ...) in the source chain.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}
