use url::Url;

/// First bytes of every well-formed M3U8 playlist
pub const PLAYLIST_SIGNATURE: &[u8] = b"#EXTM3U";

/// Media type set on rewritten playlists
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Cheap playlist detection from the target URL and declared content type.
///
/// True when the URL path ends in `.m3u8` or the content type mentions
/// `mpegurl` / `m3u8`. Body sniffing is a separate, later step
/// (see [`starts_with_signature`]).
pub fn is_playlist(target: &Url, content_type: Option<&str>) -> bool {
    if target.path().to_ascii_lowercase().ends_with(".m3u8") {
        return true;
    }

    content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("mpegurl") || ct.contains("m3u8")
        })
        .unwrap_or(false)
}

/// Body sniff: does the payload begin with `#EXTM3U`?
pub fn starts_with_signature(prefix: &[u8]) -> bool {
    prefix.starts_with(PLAYLIST_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn detects_by_extension() {
        assert!(is_playlist(&url("https://cdn.example.com/live/index.m3u8"), None));
        assert!(is_playlist(
            &url("https://cdn.example.com/live/INDEX.M3U8?token=abc"),
            None
        ));
        assert!(!is_playlist(&url("https://cdn.example.com/live/seg1.ts"), None));
    }

    #[test]
    fn extension_in_query_does_not_count() {
        assert!(!is_playlist(
            &url("https://cdn.example.com/play?file=index.m3u8"),
            Some("application/octet-stream")
        ));
    }

    #[test]
    fn detects_by_content_type() {
        let target = url("https://cdn.example.com/play");
        assert!(is_playlist(&target, Some("application/vnd.apple.mpegurl")));
        assert!(is_playlist(&target, Some("audio/x-mpegURL; charset=utf-8")));
        assert!(is_playlist(&target, Some("application/m3u8")));
        assert!(!is_playlist(&target, Some("video/MP2T")));
        assert!(!is_playlist(&target, None));
    }

    #[test]
    fn signature_sniff() {
        assert!(starts_with_signature(b"#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(!starts_with_signature(b"\xef\xbb\xbf#EXTM3U\n"));
        assert!(!starts_with_signature(b"#EXT"));
        assert!(!starts_with_signature(b"\x47\x40\x11"));
    }
}
