use crate::{
    config::Config,
    relay::Relay,
    upstream::{UpstreamLimits, build_client},
};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for connection pooling
    pub http_client: Client,
    /// Proxy relay over the shared client
    pub relay: Relay,
    /// Process start, reported by the health endpoint
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Self {
        let limits = UpstreamLimits {
            timeout: Duration::from_secs(config.upstream_timeout_secs),
            max_redirects: config.upstream_max_redirects,
            accept_invalid_certs: config.upstream_accept_invalid_certs,
        };

        let http_client = build_client(&limits).expect("Failed to create HTTP client");
        let relay = Relay::new(
            http_client.clone(),
            config.proxy_mode,
            config.block_private_targets,
        );

        Self {
            config: Arc::new(config),
            http_client,
            relay,
            started_at: Instant::now(),
        }
    }
}
