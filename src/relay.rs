//! Proxy relay: validate → fetch → (maybe) rewrite → forward.
//!
//! The relay is stateless apart from the pooled HTTP client. Each call makes
//! exactly one upstream fetch. Playlists are buffered so they can be
//! rewritten; every other body is streamed straight through.

use crate::{
    config::ProxyMode,
    error::{RelayError, Result},
    hls::{
        detect::{PLAYLIST_CONTENT_TYPE, PLAYLIST_SIGNATURE, is_playlist, starts_with_signature},
        rewriter::{RewriteContext, rewrite_playlist},
    },
    metrics,
    server::url_validation::validate_target_url,
    upstream::{UpstreamRequest, fetch_upstream},
};
use axum::{
    body::{Body, Bytes},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures_util::{Stream, StreamExt, stream};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

/// Upstream headers copied onto the relayed response. Everything else is dropped.
pub const FORWARDED_HEADERS: [HeaderName; 4] =
    [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_RANGE, ACCEPT_RANGES];

/// One relay call as seen by the proxy endpoint
#[derive(Debug, Clone)]
pub struct RelayRequest<'a> {
    /// Raw `url` query parameter
    pub target: &'a str,
    pub range: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    /// This endpoint's externally visible URL (scheme + host + path)
    pub proxy_base: &'a Url,
}

/// Status, filtered headers and body ready to send back to the caller
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
    /// Whether the body is a rewritten playlist
    pub rewritten: bool,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Stateless relay over a shared HTTP client
#[derive(Clone, Debug)]
pub struct Relay {
    client: Client,
    mode: ProxyMode,
    block_private: bool,
}

impl Relay {
    pub fn new(client: Client, mode: ProxyMode, block_private: bool) -> Self {
        Self {
            client,
            mode,
            block_private,
        }
    }

    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    /// Fetch the target and relay it, rewriting playlists on the way.
    ///
    /// # Errors
    /// - [`RelayError::InvalidInput`] for an empty or invalid target
    /// - [`RelayError::UpstreamUnreachable`] for transport failures
    pub async fn relay(&self, request: RelayRequest<'_>) -> Result<UpstreamResponse> {
        let target = validate_target_url(request.target, self.block_private)?;

        let referer = match self.mode {
            ProxyMode::Edge => Some(target.origin().ascii_serialization()),
            ProxyMode::Server => None,
        };

        let upstream = UpstreamRequest {
            url: target.as_str(),
            range: request.range,
            user_agent: request.user_agent,
            referer: referer.as_deref(),
        };

        let response = fetch_upstream(&self.client, &upstream)
            .await
            .map_err(upstream_failure)?;

        let status = response.status();
        let headers = forward_headers(response.headers());
        let declared_playlist = is_playlist(
            &target,
            headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        );

        if status != StatusCode::OK {
            return Ok(passthrough(status, headers, response.bytes_stream()));
        }

        if declared_playlist {
            let body = response.bytes().await.map_err(upstream_failure)?;
            return Ok(rewritten(status, headers, &body, target, request.proxy_base));
        }

        if self.mode == ProxyMode::Server {
            // Last resort for mislabelled playlists: peek at the body.
            let mut body_stream = Box::pin(response.bytes_stream());
            let prefix = read_prefix(&mut body_stream, PLAYLIST_SIGNATURE.len())
                .await
                .map_err(upstream_failure)?;
            let head: Vec<u8> = prefix.iter().flat_map(|c| c.iter().copied()).collect();

            if starts_with_signature(&head) {
                debug!("Body sniff identified {} as a playlist", target);
                let mut body = head;
                while let Some(chunk) = body_stream.next().await {
                    body.extend_from_slice(&chunk.map_err(upstream_failure)?);
                }
                return Ok(rewritten(status, headers, &body, target, request.proxy_base));
            }

            let replay = stream::iter(prefix.into_iter().map(Ok::<Bytes, reqwest::Error>));
            return Ok(passthrough(status, headers, replay.chain(body_stream)));
        }

        Ok(passthrough(status, headers, response.bytes_stream()))
    }
}

/// Transport failure while talking to the origin, before or after its headers arrived.
fn upstream_failure(e: reqwest::Error) -> RelayError {
    metrics::record_upstream_error();
    RelayError::UpstreamUnreachable(e)
}

/// Copy only the allow-listed upstream headers.
pub fn forward_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in FORWARDED_HEADERS.iter() {
        for value in upstream.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

fn passthrough<S>(status: StatusCode, headers: HeaderMap, body: S) -> UpstreamResponse
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
{
    UpstreamResponse {
        status,
        headers,
        body: Body::from_stream(body),
        rewritten: false,
    }
}

fn rewritten(
    status: StatusCode,
    mut headers: HeaderMap,
    body: &[u8],
    target: Url,
    proxy_base: &Url,
) -> UpstreamResponse {
    let text = String::from_utf8_lossy(body);
    let ctx = RewriteContext::new(target, proxy_base.clone());
    let playlist = rewrite_playlist(&text, &ctx);

    info!(
        "Rewrote playlist {} ({} -> {} bytes)",
        ctx.base_url(),
        body.len(),
        playlist.len()
    );
    metrics::record_playlist_rewrite();

    headers.remove(CONTENT_LENGTH);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PLAYLIST_CONTENT_TYPE));

    UpstreamResponse {
        status,
        headers,
        body: Body::from(playlist),
        rewritten: true,
    }
}

/// Pull chunks until at least `len` bytes are buffered or the body ends.
async fn read_prefix<S>(
    body: &mut S,
    len: usize,
) -> std::result::Result<Vec<Bytes>, reqwest::Error>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
{
    let mut chunks = Vec::new();
    let mut buffered = 0;

    while buffered < len {
        match body.next().await {
            Some(chunk) => {
                let chunk = chunk?;
                buffered += chunk.len();
                chunks.push(chunk);
            }
            None => break,
        }
    }

    Ok(chunks)
}
