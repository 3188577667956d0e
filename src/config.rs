use crate::error::ErrorFormat;
use std::env;
use std::path::PathBuf;

/// Which deployment flavour of the relay to mimic
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyMode {
    /// Script-style relay: JSON errors, `#EXTM3U` body sniffing, 200 preflight,
    /// POST relayed like GET
    Server,
    /// Edge-function relay: plain-text errors, no body sniffing, 204 preflight
    /// with max-age, `Referer` forwarded upstream, POST rejected
    Edge,
}

impl ProxyMode {
    pub fn error_format(self) -> ErrorFormat {
        match self {
            ProxyMode::Server => ErrorFormat::Json,
            ProxyMode::Edge => ErrorFormat::PlainText,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Externally visible base (scheme + host) used when rewriting playlists.
    /// When unset it is derived from the request's `Host` header.
    pub public_base_url: Option<String>,
    pub is_dev: bool,
    /// Path of the JSON settings document served by `/config` and `/services`
    pub settings_path: PathBuf,
    pub proxy_mode: ProxyMode,
    /// Total upstream timeout in seconds (default: 30)
    pub upstream_timeout_secs: u64,
    /// Redirects followed per upstream fetch (default: 5)
    pub upstream_max_redirects: usize,
    /// Skip TLS certificate verification for upstream fetches
    pub upstream_accept_invalid_certs: bool,
    /// Reject IP-literal targets in private/loopback/link-local ranges
    pub block_private_targets: bool,
    /// Serve absolute-form media requests through the interceptor
    pub intercept_media: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env_flag("DEV_MODE", false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let public_base_url = match env::var("PUBLIC_BASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => {
                let parsed = url::Url::parse(raw.trim())
                    .map_err(|e| format!("PUBLIC_BASE_URL is not a valid URL: {e}"))?;
                Some(parsed.as_str().trim_end_matches('/').to_string())
            }
            _ => None,
        };

        let settings_path = env::var("SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/settings.json"));

        let proxy_mode = match env::var("PROXY_MODE")
            .unwrap_or_else(|_| "server".to_string())
            .to_lowercase()
            .as_str()
        {
            "edge" | "worker" => ProxyMode::Edge,
            _ => ProxyMode::Server,
        };

        let upstream_timeout_secs: u64 = env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);
        if upstream_timeout_secs == 0 {
            return Err("UPSTREAM_TIMEOUT_SECS must be at least 1".into());
        }

        let upstream_max_redirects: usize = env::var("UPSTREAM_MAX_REDIRECTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        Ok(Config {
            port,
            public_base_url,
            is_dev,
            settings_path,
            proxy_mode,
            upstream_timeout_secs,
            upstream_max_redirects,
            upstream_accept_invalid_certs: env_flag("UPSTREAM_ACCEPT_INVALID_CERTS", false),
            block_private_targets: env_flag("BLOCK_PRIVATE_TARGETS", false),
            intercept_media: env_flag("INTERCEPT_MEDIA", true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all env-var tests to prevent races between parallel test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "DEV_MODE",
        "PORT",
        "PUBLIC_BASE_URL",
        "SETTINGS_PATH",
        "PROXY_MODE",
        "UPSTREAM_TIMEOUT_SECS",
        "UPSTREAM_MAX_REDIRECTS",
        "UPSTREAM_ACCEPT_INVALID_CERTS",
        "BLOCK_PRIVATE_TARGETS",
        "INTERCEPT_MEDIA",
    ];

    /// Clear every relay variable, set `set`, run `f`, then restore original state.
    fn with_env(set: &[(&str, &str)], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());

        let saved: Vec<(&str, Option<String>)> =
            ALL_VARS.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        for k in ALL_VARS {
            // SAFETY: serialized by ENV_LOCK, no other thread modifies env vars concurrently.
            unsafe { std::env::remove_var(k) };
        }
        for (k, v) in set {
            unsafe { std::env::set_var(k, v) };
        }

        f();

        for (k, old) in saved {
            match old {
                Some(v) => unsafe { std::env::set_var(k, v) },
                None => unsafe { std::env::remove_var(k) },
            }
        }
    }

    #[test]
    fn dev_mode_uses_defaults() {
        with_env(&[("DEV_MODE", "true")], || {
            let config = Config::from_env().expect("should succeed in dev mode");
            assert!(config.is_dev);
            assert_eq!(config.port, 3000);
            assert_eq!(config.public_base_url, None);
            assert_eq!(config.settings_path, PathBuf::from("config/settings.json"));
            assert_eq!(config.proxy_mode, ProxyMode::Server);
            assert_eq!(config.upstream_timeout_secs, 30);
            assert_eq!(config.upstream_max_redirects, 5);
            assert!(!config.upstream_accept_invalid_certs);
            assert!(!config.block_private_targets);
            assert!(config.intercept_media);
        });
    }

    #[test]
    fn prod_mode_requires_port() {
        with_env(&[], || {
            let result = Config::from_env();
            assert!(result.is_err(), "Should fail without PORT in prod mode");
        });
    }

    #[test]
    fn prod_mode_with_port() {
        with_env(&[("PORT", "8080")], || {
            let config = Config::from_env().unwrap();
            assert!(!config.is_dev);
            assert_eq!(config.port, 8080);
        });
    }

    #[test]
    fn public_base_url_trailing_slash_trimmed() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("PUBLIC_BASE_URL", "https://relay.example.com/"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(
                    config.public_base_url.as_deref(),
                    Some("https://relay.example.com")
                );
            },
        );
    }

    #[test]
    fn invalid_public_base_url_rejected() {
        with_env(
            &[("DEV_MODE", "true"), ("PUBLIC_BASE_URL", "relay.example.com")],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }

    #[test]
    fn proxy_mode_edge() {
        with_env(&[("DEV_MODE", "true"), ("PROXY_MODE", "edge")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.proxy_mode, ProxyMode::Edge);
            assert_eq!(config.proxy_mode.error_format(), ErrorFormat::PlainText);
        });
    }

    #[test]
    fn unknown_proxy_mode_falls_back_to_server() {
        with_env(&[("DEV_MODE", "true"), ("PROXY_MODE", "bogus")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.proxy_mode, ProxyMode::Server);
        });
    }

    #[test]
    fn upstream_limits_parsed() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("UPSTREAM_TIMEOUT_SECS", "10"),
                ("UPSTREAM_MAX_REDIRECTS", "2"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.upstream_timeout_secs, 10);
                assert_eq!(config.upstream_max_redirects, 2);
            },
        );
    }

    #[test]
    fn zero_upstream_timeout_rejected() {
        with_env(
            &[("DEV_MODE", "true"), ("UPSTREAM_TIMEOUT_SECS", "0")],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(err.to_string().contains("UPSTREAM_TIMEOUT_SECS"));
            },
        );
    }

    #[test]
    fn boolean_flags_parsed() {
        with_env(
            &[
                ("DEV_MODE", "1"),
                ("UPSTREAM_ACCEPT_INVALID_CERTS", "yes"),
                ("BLOCK_PRIVATE_TARGETS", "true"),
                ("INTERCEPT_MEDIA", "off"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.is_dev);
                assert!(config.upstream_accept_invalid_certs);
                assert!(config.block_private_targets);
                assert!(!config.intercept_media);
            },
        );
    }
}
