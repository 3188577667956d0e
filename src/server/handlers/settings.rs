use crate::{
    error::Result,
    server::state::AppState,
    settings::{ApiResponse, AppConfig, ServicesListing, load_settings},
};
use axum::{Json, extract::State};
use tracing::info;

/// UI branding from the settings document
pub async fn get_config(State(state): State<AppState>) -> Result<Json<ApiResponse<AppConfig>>> {
    let document = load_settings(&state.config.settings_path).await?;
    let config = document.app_config();

    info!("Serving app config for {}", config.app_name);
    Ok(Json(ApiResponse::ok(config)))
}

/// Selectable upstream services from the settings document
pub async fn get_services(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ServicesListing>>> {
    let document = load_settings(&state.config.settings_path).await?;
    let listing = document.services_listing();

    info!(
        "Serving {} services (custom allowed: {})",
        listing.services.as_array().map_or(0, Vec::len),
        listing.allow_custom
    );
    Ok(Json(ApiResponse::ok(listing)))
}
