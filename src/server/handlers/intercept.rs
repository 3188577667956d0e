//! Media request interception for forward-proxy clients.
//!
//! Requests arriving in absolute form (`GET http://cdn.example.com/a.m3u8`)
//! are taken by [`intercept_absolute_form`] before they reach any local
//! route, so `http://cdn.example.com/health` is fetched from the CDN rather
//! than answered by this service. Media requests are returned with CORS
//! headers; everything else is returned untouched. Nothing is rewritten,
//! cached or retried.

use crate::{
    error::{RelayError, Result},
    metrics,
    server::{cors::Passthrough, state::AppState},
};
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    middleware::Next,
    http::{HeaderMap, HeaderName, HeaderValue, Uri, header},
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

/// Path suffixes that mark a media request
pub const MEDIA_EXTENSIONS: [&str; 3] = [".m3u8", ".ts", ".m3u"];

/// Query parameter that marks a media request regardless of path
pub const STREAM_PARAM: &str = "stream";

/// `Via` token stamped on outbound requests to detect loops
pub const VIA_TOKEN: &str = "1.1 hls-relay";

/// Largest request body forwarded by the interceptor
const MAX_FORWARDED_BODY: usize = 16 * 1024 * 1024;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Router middleware: absolute-form requests bypass local routes and go
/// straight to [`intercept`] while interception is enabled.
pub async fn intercept_absolute_form(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.config.intercept_media && absolute_target(request.uri()).is_some() {
        return intercept(State(state), request).await;
    }
    next.run(request).await
}

/// Router fallback: intercept absolute-form requests, 404 everything else.
pub async fn intercept(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();

    let response = match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => e.render(state.config.proxy_mode.error_format()),
    };

    metrics::record_request("intercept", response.status().as_u16());
    metrics::record_duration("intercept", start);

    response
}

async fn forward(state: &AppState, request: Request) -> Result<Response> {
    if !state.config.intercept_media {
        return Err(RelayError::NotFound);
    }

    let (parts, body) = request.into_parts();

    let Some(target) = absolute_target(&parts.uri) else {
        return Err(RelayError::NotFound);
    };

    if is_looped(&parts.headers) {
        warn!("Refusing to intercept looped request for {}", target);
        return Err(RelayError::NotFound);
    }

    let media = is_media_request(&target);
    info!(
        "Intercepting {} {} (media: {})",
        parts.method, target, media
    );

    let body = to_bytes(body, MAX_FORWARDED_BODY)
        .await
        .map_err(|e| RelayError::InvalidInput(format!("Unreadable request body: {e}")))?;

    let mut outbound_headers = strip_hop_by_hop(&parts.headers);
    outbound_headers.remove(header::HOST);
    outbound_headers.remove(header::CONTENT_LENGTH);
    outbound_headers.append(header::VIA, HeaderValue::from_static(VIA_TOKEN));

    let mut outbound = state
        .http_client
        .request(parts.method, target.as_str())
        .headers(outbound_headers);
    if !body.is_empty() {
        outbound = outbound.body(body);
    }

    let upstream = outbound.send().await.map_err(|e| {
        metrics::record_upstream_error();
        RelayError::InterceptFailed(e)
    })?;

    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    if !media {
        response.extensions_mut().insert(Passthrough);
    }

    Ok(response)
}

/// Media requests end in `.m3u8`, `.ts` or `.m3u`, or carry a `stream` query parameter.
pub fn is_media_request(target: &Url) -> bool {
    let path = target.path().to_ascii_lowercase();

    MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || target.query_pairs().any(|(key, _)| key == STREAM_PARAM)
}

/// The request target when it arrived in absolute form with an http(s) scheme.
fn absolute_target(uri: &Uri) -> Option<Url> {
    match uri.scheme_str() {
        Some("http") | Some("https") if uri.authority().is_some() => {
            Url::parse(&uri.to_string()).ok()
        }
        _ => None,
    }
}

fn is_looped(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::VIA)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("hls-relay"))
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = headers.clone();
    for name in HOP_BY_HOP {
        filtered.remove(HeaderName::from_static(name));
    }
    filtered
}
