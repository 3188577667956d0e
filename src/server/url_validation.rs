use crate::error::RelayError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Validate a relay target and return it parsed.
///
/// Accepts only absolute `http://` and `https://` URLs with a host.
///
/// When `block_private` is set, **IP literals** are additionally checked
/// against private and reserved ranges. **Hostnames** are accepted without
/// DNS resolution, so DNS rebinding is not covered.
///
/// # Errors
/// Returns [`RelayError::InvalidInput`] for:
/// - An empty target
/// - Invalid or relative URLs
/// - Non-HTTP(S) schemes
/// - URLs without a host
/// - Blocked IPv4/IPv6 literals (only with `block_private`)
pub fn validate_target_url(url: &str, block_private: bool) -> Result<Url, RelayError> {
    if url.trim().is_empty() {
        return Err(RelayError::InvalidInput("Missing url parameter".to_string()));
    }

    let parsed =
        Url::parse(url).map_err(|_| RelayError::InvalidInput(format!("Invalid URL: {url}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::InvalidInput(format!(
                "Invalid URL: scheme '{scheme}' not allowed, only http/https permitted"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| RelayError::InvalidInput(format!("Invalid URL: no host in {url}")))?;

    if block_private {
        match host {
            Host::Ipv4(ip) if is_blocked_ipv4(ip) => {
                return Err(RelayError::InvalidInput(format!(
                    "Invalid URL: private or reserved IPv4 address not allowed: {ip}"
                )));
            }
            Host::Ipv6(ip) if is_blocked_ipv6(ip) => {
                return Err(RelayError::InvalidInput(format!(
                    "Invalid URL: private or reserved IPv6 address not allowed: {ip}"
                )));
            }
            _ => {}
        }
    }

    Ok(parsed)
}

/// Returns `true` for IPv4 addresses in private or reserved ranges.
///
/// Blocked ranges:
/// - `0.0.0.0/8`     : "this" network (RFC 1122)
/// - `10.0.0.0/8`    : RFC 1918 private
/// - `127.0.0.0/8`   : loopback
/// - `169.254.0.0/16`: link-local / cloud-metadata
/// - `172.16.0.0/12` : RFC 1918 private
/// - `192.168.0.0/16`: RFC 1918 private
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();

    a == 0
        || a == 10
        || a == 127
        || (a == 169 && b == 254)
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
}

/// Returns `true` for IPv6 loopback, link-local (`fe80::/10`) and
/// unique-local (`fc00::/7`) addresses.
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let s = ip.segments();

    ip.is_loopback() || (s[0] & 0xffc0) == 0xfe80 || (s[0] & 0xfe00) == 0xfc00
}
