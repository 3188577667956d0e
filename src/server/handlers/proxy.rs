use crate::{
    config::{Config, ProxyMode},
    error::{RelayError, Result},
    metrics,
    relay::RelayRequest,
    server::state::AppState,
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;
use url::Url;

/// Relay `?url=<target>` back to the caller, rewriting playlists.
///
/// GET always relays. POST relays like GET in server mode and is rejected in
/// edge mode.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let start = Instant::now();
    let format = state.config.proxy_mode.error_format();

    let response = if method == Method::POST && state.config.proxy_mode == ProxyMode::Edge {
        RelayError::MethodNotAllowed.render(format)
    } else {
        match relay_request(&state, &uri, &headers, &params).await {
            Ok(upstream) => upstream.into_response(),
            Err(e) => e.render(format),
        }
    };

    metrics::record_request("proxy", response.status().as_u16());
    metrics::record_duration("proxy", start);

    response
}

async fn relay_request(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<crate::relay::UpstreamResponse> {
    let target = params.get("url").map(String::as_str).unwrap_or("");
    let proxy_base = proxy_base_url(&state.config, headers, uri)?;

    info!("Relaying {} via {}", target, proxy_base);

    state
        .relay
        .relay(RelayRequest {
            target,
            range: header_str(headers, header::RANGE),
            user_agent: header_str(headers, header::USER_AGENT),
            proxy_base: &proxy_base,
        })
        .await
}

/// Method fallback for routes that only serve GET/POST/OPTIONS
pub async fn method_not_allowed(State(state): State<AppState>) -> Response {
    RelayError::MethodNotAllowed.render(state.config.proxy_mode.error_format())
}

/// The URL this endpoint is reachable at from the outside, without query.
///
/// `PUBLIC_BASE_URL` wins; otherwise scheme comes from `X-Forwarded-Proto`
/// (default `http`) and host from the `Host` header.
pub fn proxy_base_url(config: &Config, headers: &HeaderMap, uri: &Uri) -> Result<Url> {
    let origin = match &config.public_base_url {
        Some(base) => base.clone(),
        None => {
            let host = header_str(headers, header::HOST)
                .or_else(|| uri.authority().map(|a| a.as_str()))
                .unwrap_or("localhost");
            let scheme = header_str(headers, "x-forwarded-proto")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("http");
            format!("{scheme}://{host}")
        }
    };

    Url::parse(&format!("{}{}", origin, uri.path()))
        .map_err(|_| RelayError::InvalidInput(format!("Invalid Host header: {origin}")))
}

fn header_str<K: header::AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
