//! Single-shot upstream fetch.
//!
//! Provides [`fetch_upstream`], the only suspension point of a relay request.
//! Redirect and timeout bounds live on the shared [`Client`] (see
//! [`build_client`]); this module never retries.

use reqwest::{Client, Response, header, redirect};
use std::time::Duration;
use tracing::{info, warn};

/// User-Agent sent when the caller did not supply one.
pub const FALLBACK_USER_AGENT: &str = "Mozilla/5.0";

/// Default number of redirects followed per fetch.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default total timeout per fetch in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Limits applied to every upstream fetch.
#[derive(Debug, Clone)]
pub struct UpstreamLimits {
    /// Total time for connect, headers and body.
    pub timeout: Duration,
    /// Redirects followed before the fetch fails.
    pub max_redirects: usize,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
}

impl Default for UpstreamLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            accept_invalid_certs: false,
        }
    }
}

/// Build the pooled HTTP client shared by all handlers.
pub fn build_client(limits: &UpstreamLimits) -> Result<Client, reqwest::Error> {
    Client::builder()
        .redirect(redirect::Policy::limited(limits.max_redirects))
        .timeout(limits.timeout)
        .danger_accept_invalid_certs(limits.accept_invalid_certs)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .build()
}

/// What to forward to the upstream server.
#[derive(Debug, Clone, Default)]
pub struct UpstreamRequest<'a> {
    pub url: &'a str,
    /// Caller's `Range` header, passed through verbatim
    pub range: Option<&'a str>,
    /// Caller's `User-Agent`; [`FALLBACK_USER_AGENT`] when absent
    pub user_agent: Option<&'a str>,
    pub referer: Option<&'a str>,
}

/// Fetch a URL via HTTP GET, exactly once.
///
/// Non-2xx statuses are not errors here: the relay forwards whatever status
/// the upstream answered.
///
/// # Errors
///
/// Returns the transport error (DNS, connect, TLS, timeout, redirect limit).
pub async fn fetch_upstream(
    client: &Client,
    request: &UpstreamRequest<'_>,
) -> Result<Response, reqwest::Error> {
    let user_agent = request
        .user_agent
        .filter(|ua| !ua.is_empty())
        .unwrap_or(FALLBACK_USER_AGENT);

    let mut builder = client
        .get(request.url)
        .header(header::USER_AGENT, user_agent);

    if let Some(range) = request.range {
        builder = builder.header(header::RANGE, range);
    }
    if let Some(referer) = request.referer {
        builder = builder.header(header::REFERER, referer);
    }

    match builder.send().await {
        Ok(response) => {
            info!(
                "Upstream {} answered {} (final url {})",
                request.url,
                response.status(),
                response.url()
            );
            Ok(response)
        }
        Err(e) => {
            warn!("Upstream fetch failed for {}: {}", request.url, e);
            Err(e)
        }
    }
}
