//! Settings document behind the `/config` and `/services` endpoints.
//!
//! The document is a JSON object read fresh on every request; there is no
//! caching and no write path. Every key is optional and falls back to a
//! documented default.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_APP_NAME: &str = "IPTV Player";
pub const DEFAULT_PRIMARY_COLOR: &str = "#1a73e8";
pub const DEFAULT_ACCENT_COLOR: &str = "#00bcd4";
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Raw settings document as stored on disk.
///
/// Values are kept as raw JSON and passed through whatever their type; only
/// absent or `null` keys fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsDocument {
    pub app_name: Option<Value>,
    pub logo_url: Option<Value>,
    pub primary_color: Option<Value>,
    pub accent_color: Option<Value>,
    /// Feature flags, passed through to the UI verbatim
    pub features: Option<Value>,
    /// Service descriptors for the UI's service picker, passed through verbatim
    pub services: Option<Value>,
    pub allow_custom_service: Option<Value>,
    pub version: Option<Value>,
}

/// Branding payload of `GET /config`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub app_name: Value,
    pub logo_url: Value,
    pub primary_color: Value,
    pub accent_color: Value,
    pub features: Value,
    pub version: Value,
}

/// Payload of `GET /services`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicesListing {
    pub services: Value,
    pub allow_custom: Value,
}

/// `{"success": true, "data": ...}` envelope used by both endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl SettingsDocument {
    /// Parse a settings document from JSON text.
    ///
    /// Anything that is not a JSON object (including `null`) is rejected.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| RelayError::ConfigInvalid(e.to_string()))?;

        if !value.is_object() {
            return Err(RelayError::ConfigInvalid(
                "settings document must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| RelayError::ConfigInvalid(e.to_string()))
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            app_name: or_default(&self.app_name, || DEFAULT_APP_NAME.into()),
            logo_url: or_default(&self.logo_url, || "".into()),
            primary_color: or_default(&self.primary_color, || DEFAULT_PRIMARY_COLOR.into()),
            accent_color: or_default(&self.accent_color, || DEFAULT_ACCENT_COLOR.into()),
            features: or_default(&self.features, || Value::Array(Vec::new())),
            version: or_default(&self.version, || DEFAULT_VERSION.into()),
        }
    }

    pub fn services_listing(&self) -> ServicesListing {
        ServicesListing {
            services: or_default(&self.services, || Value::Array(Vec::new())),
            allow_custom: or_default(&self.allow_custom_service, || Value::Bool(true)),
        }
    }
}

// `null` deserializes to `None`, so it takes the default as well.
fn or_default(value: &Option<Value>, default: impl FnOnce() -> Value) -> Value {
    value.clone().unwrap_or_else(default)
}

/// Read and parse the settings document at `path`.
///
/// # Errors
/// - [`RelayError::ConfigMissing`] when the file does not exist
/// - [`RelayError::ConfigInvalid`] when it cannot be read or parsed
pub async fn load_settings(path: &Path) -> Result<SettingsDocument> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RelayError::ConfigMissing(path.display().to_string()));
        }
        Err(e) => {
            return Err(RelayError::ConfigInvalid(format!(
                "{}: {}",
                path.display(),
                e
            )));
        }
    };

    debug!("Loaded settings document from {}", path.display());
    SettingsDocument::from_json(&raw)
}
