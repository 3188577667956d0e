//! Line-oriented M3U8 rewriting.
//!
//! Every segment or variant reference in a playlist is resolved against the
//! playlist's own URL and wrapped so that the player fetches it back through
//! the relay (`{proxy_base}?url={encoded}`). Directive and blank lines are
//! copied through byte-for-byte, and the line count never changes.

use tracing::{debug, warn};
use url::{Url, form_urlencoded};

/// Classification of a single playlist line, decided on its trimmed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistLine<'a> {
    /// `#EXTM3U`, `#EXTINF`, `#EXT-X-*` or any other `#` line
    Comment(&'a str),
    Blank,
    /// Media segment or nested playlist URI (absolute or relative)
    SegmentReference(&'a str),
}

impl<'a> PlaylistLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            PlaylistLine::Blank
        } else if trimmed.starts_with('#') {
            PlaylistLine::Comment(trimmed)
        } else {
            PlaylistLine::SegmentReference(trimmed)
        }
    }
}

/// Where a playlist came from and where its references must point.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    base_url: Url,
    proxy_base: Url,
}

impl RewriteContext {
    /// `proxy_base` loses its query and fragment; only scheme, host and path
    /// are used when building replacement references.
    pub fn new(base_url: Url, mut proxy_base: Url) -> Self {
        proxy_base.set_query(None);
        proxy_base.set_fragment(None);
        Self {
            base_url,
            proxy_base,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn proxy_base(&self) -> &Url {
        &self.proxy_base
    }
}

/// Rewrite all segment references in `content` to route through the relay.
pub fn rewrite_playlist(content: &str, ctx: &RewriteContext) -> String {
    let mut rewritten = 0usize;

    let lines: Vec<String> = content
        .split('\n')
        .map(|line| match PlaylistLine::classify(line) {
            PlaylistLine::Comment(_) | PlaylistLine::Blank => line.to_string(),
            PlaylistLine::SegmentReference(reference) => {
                match resolve_reference(reference, &ctx.base_url) {
                    Some(resolved) => {
                        rewritten += 1;
                        proxied_url(&ctx.proxy_base, &resolved)
                    }
                    None => {
                        warn!(
                            "Leaving unresolvable playlist reference untouched: {}",
                            reference
                        );
                        line.to_string()
                    }
                }
            }
        })
        .collect();

    debug!(
        "Rewrote {} playlist references from {}",
        rewritten, ctx.base_url
    );

    lines.join("\n")
}

/// Resolve a playlist reference to an absolute URL.
///
/// References that already carry an `http://` or `https://` scheme are
/// returned verbatim. Everything else goes through standard relative-URL
/// resolution against `base`.
pub fn resolve_reference(reference: &str, base: &Url) -> Option<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Some(reference.to_string());
    }

    base.join(reference).ok().map(String::from)
}

/// Build `{proxy_base}?url={target}` with the target form-urlencoded.
pub fn proxied_url(proxy_base: &Url, target: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{}?url={}", proxy_base.as_str(), encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RewriteContext {
        RewriteContext::new(
            Url::parse("https://h/path/master.m3u8").unwrap(),
            Url::parse("https://p/proxy").unwrap(),
        )
    }

    #[test]
    fn classify_lines() {
        assert_eq!(PlaylistLine::classify(""), PlaylistLine::Blank);
        assert_eq!(PlaylistLine::classify("   \r"), PlaylistLine::Blank);
        assert_eq!(
            PlaylistLine::classify("#EXTINF:10.0,"),
            PlaylistLine::Comment("#EXTINF:10.0,")
        );
        assert_eq!(
            PlaylistLine::classify("  #EXT-X-ENDLIST"),
            PlaylistLine::Comment("#EXT-X-ENDLIST")
        );
        assert_eq!(
            PlaylistLine::classify(" seg1.ts \r"),
            PlaylistLine::SegmentReference("seg1.ts")
        );
    }

    #[test]
    fn comments_and_blanks_are_byte_identical() {
        let input = "#EXTM3U\n#EXT-X-VERSION:3\r\n\n   \n#EXT-X-ENDLIST\n";
        assert_eq!(rewrite_playlist(input, &ctx()), input);
    }

    #[test]
    fn relative_reference_joins_base_directory() {
        assert_eq!(
            rewrite_playlist("seg1.ts", &ctx()),
            "https://p/proxy?url=https%3A%2F%2Fh%2Fpath%2Fseg1.ts"
        );
    }

    #[test]
    fn absolute_path_reference_replaces_path() {
        assert_eq!(
            resolve_reference("/seg/seg1.ts", ctx().base_url()).as_deref(),
            Some("https://h/seg/seg1.ts")
        );
        assert_eq!(
            rewrite_playlist("/seg/seg1.ts", &ctx()),
            "https://p/proxy?url=https%3A%2F%2Fh%2Fseg%2Fseg1.ts"
        );
    }

    #[test]
    fn absolute_reference_is_kept_verbatim() {
        assert_eq!(
            resolve_reference("http://cdn.example.com:8080/x/seg.ts", ctx().base_url())
                .as_deref(),
            Some("http://cdn.example.com:8080/x/seg.ts")
        );
        assert_eq!(
            rewrite_playlist("https://CDN.example.com/a/../seg.ts", &ctx()),
            "https://p/proxy?url=https%3A%2F%2FCDN.example.com%2Fa%2F..%2Fseg.ts"
        );
    }

    #[test]
    fn parent_segments_collapse() {
        assert_eq!(
            resolve_reference("../other/seg.ts", ctx().base_url()).as_deref(),
            Some("https://h/other/seg.ts")
        );
    }

    #[test]
    fn line_count_and_trailing_newline_preserved() {
        let input = "#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n#EXTINF:4.0,\n  seg2.ts  \n";
        let output = rewrite_playlist(input, &ctx());

        assert_eq!(output.split('\n').count(), input.split('\n').count());
        assert!(output.ends_with('\n'));

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXTINF:4.0,");
        assert_eq!(
            lines[2],
            "https://p/proxy?url=https%3A%2F%2Fh%2Fpath%2Fseg1.ts"
        );
        assert_eq!(
            lines[4],
            "https://p/proxy?url=https%3A%2F%2Fh%2Fpath%2Fseg2.ts"
        );
    }

    #[test]
    fn master_playlist_variants_are_rewritten() {
        let input = "#EXTM3U\n\
                     #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
                     low/index.m3u8\n\
                     #EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720\n\
                     https://other.example/high/index.m3u8?token=a b";
        let output = rewrite_playlist(input, &ctx());
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(
            lines[2],
            "https://p/proxy?url=https%3A%2F%2Fh%2Fpath%2Flow%2Findex.m3u8"
        );
        assert_eq!(
            lines[4],
            "https://p/proxy?url=https%3A%2F%2Fother.example%2Fhigh%2Findex.m3u8%3Ftoken%3Da+b"
        );
    }

    #[test]
    fn proxy_base_query_is_stripped() {
        let ctx = RewriteContext::new(
            Url::parse("https://h/path/master.m3u8").unwrap(),
            Url::parse("https://p/proxy?url=https%3A%2F%2Fh%2Fpath%2Fmaster.m3u8#frag").unwrap(),
        );
        assert_eq!(ctx.proxy_base().as_str(), "https://p/proxy");
        assert_eq!(
            rewrite_playlist("seg1.ts", &ctx),
            "https://p/proxy?url=https%3A%2F%2Fh%2Fpath%2Fseg1.ts"
        );
    }

    #[test]
    fn tag_attribute_uris_are_untouched() {
        let input = "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"";
        assert_eq!(rewrite_playlist(input, &ctx()), input);
    }
}
