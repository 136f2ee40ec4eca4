//! Read-only status API
//!
//! Serves the location and snapshot registries as JSON and the snapshot files
//! themselves as static downloads under `/orderbooks`.

use crate::{Config, Registry, Result};
use axum::{Router, http::HeaderValue, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router
///
/// # Routes
///
/// ## Locations
/// - `GET /api/v1/locations` - Status of every tracked location
/// - `GET /api/v1/locations/:id` - Status of one location
///
/// ## Snapshots
/// - `GET /api/v1/snapshots` - Retained snapshots, newest first
/// - `GET /api/v1/snapshots/:id` - Statistics of one snapshot
///
/// ## Files
/// - `GET /orderbooks/<file>` - Snapshot file download
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /api/v1/openapi.json` - OpenAPI specification
pub fn create_router(registry: Registry, config: Arc<Config>) -> Router {
    let state = AppState::new(registry, config.clone());

    let api = Router::new()
        .route("/locations", get(routes::list_locations))
        .route("/locations/:id", get(routes::get_location))
        .route("/snapshots", get(routes::list_snapshots))
        .route("/snapshots/:id", get(routes::get_snapshot))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = Router::new()
        .route("/health", get(routes::health_check))
        .nest("/api/v1", api)
        .with_state(state)
        .nest_service("/orderbooks", ServeDir::new(&config.output_dir))
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin. Only GET is ever served.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the status API until `cancel` fires
///
/// Binds the configured address, serves requests, and drains in-flight
/// requests on cancellation.
pub async fn start_api_server(
    registry: Registry,
    config: Arc<Config>,
    cancel: CancellationToken,
) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(registry, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
