//! CORS header injection.
//!
//! [`decorate_response`] runs as router middleware over every response,
//! including errors, 404s and 405s. The only responses it leaves alone are
//! intercepted non-media pass-throughs, which carry the [`Passthrough`]
//! extension.

use crate::{config::ProxyMode, server::state::AppState};
use axum::{
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
        },
    },
    response::{IntoResponse, Response},
};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
/// Edge mode rejects POST, so it does not advertise it
pub const EDGE_ALLOW_METHODS: &str = "GET, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Range";
pub const EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges";
/// Preflight cache lifetime advertised in edge mode (one day)
pub const PREFLIGHT_MAX_AGE: &str = "86400";

pub const VERSION_HEADER: &str = "x-hls-relay-version";

/// Response extension marking a response that must leave the relay untouched
#[derive(Clone, Copy, Debug)]
pub struct Passthrough;

pub fn allow_methods(mode: ProxyMode) -> &'static str {
    match mode {
        ProxyMode::Server => ALLOW_METHODS,
        ProxyMode::Edge => EDGE_ALLOW_METHODS,
    }
}

/// Overwrite the CORS headers on `headers`.
pub fn apply_cors_headers(headers: &mut HeaderMap, mode: ProxyMode) {
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(allow_methods(mode)),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
}

/// Router middleware: CORS and version headers on everything but pass-throughs.
pub async fn decorate_response(State(state): State<AppState>, response: Response) -> Response {
    decorate(response, state.config.proxy_mode)
}

fn decorate(mut response: Response, mode: ProxyMode) -> Response {
    if response.extensions().get::<Passthrough>().is_some() {
        return response;
    }

    let headers = response.headers_mut();
    apply_cors_headers(headers, mode);
    headers.insert(
        HeaderName::from_static(VERSION_HEADER),
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// `OPTIONS` handler: empty body, CORS headers added by [`decorate_response`].
///
/// Query parameters are ignored entirely.
pub async fn preflight(State(state): State<AppState>) -> Response {
    match state.config.proxy_mode {
        ProxyMode::Server => StatusCode::OK.into_response(),
        ProxyMode::Edge => (
            StatusCode::NO_CONTENT,
            [(ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE)],
        )
            .into_response(),
    }
}
