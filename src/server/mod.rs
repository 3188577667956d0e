pub mod cors;
pub mod handlers;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use axum::{Router, middleware, routing::get};
use state::AppState;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the Axum router with all routes and middleware.
///
/// Separated from [`start`] so tests can drive the router directly with
/// `tower::ServiceExt::oneshot` without binding a TCP listener.
pub async fn build_router(config: Config) -> Router {
    crate::metrics::init();

    let state = AppState::new(config);

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render_metrics))
        .route(
            "/proxy",
            get(handlers::proxy::proxy)
                .post(handlers::proxy::proxy)
                .options(cors::preflight)
                .fallback(handlers::proxy::method_not_allowed),
        )
        .route(
            "/config",
            get(handlers::settings::get_config)
                .options(cors::preflight)
                .fallback(handlers::proxy::method_not_allowed),
        )
        .route(
            "/services",
            get(handlers::settings::get_services)
                .options(cors::preflight)
                .fallback(handlers::proxy::method_not_allowed),
        )
        .fallback(handlers::intercept::intercept)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::intercept::intercept_absolute_form,
        ))
        .layer(middleware::map_response_with_state(
            state.clone(),
            cors::decorate_response,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    info!(
        "Proxy mode: {:?}, settings: {}, interceptor: {}",
        config.proxy_mode,
        config.settings_path.display(),
        if config.intercept_media { "on" } else { "off" }
    );

    let app = build_router(config).await;

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
