//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa and served at
//! `/api/v1/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the orderbook-fetcher status API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "orderbook-fetcher status API",
        version = "0.1.0",
        description = "Read-only view of tracked market locations and the order book snapshots retained on disk",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local status server")
    ),
    paths(
        // Locations
        crate::api::routes::list_locations,
        crate::api::routes::get_location,

        // Snapshots
        crate::api::routes::list_snapshots,
        crate::api::routes::get_snapshot,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::LocationKind,
        crate::types::LocationStatus,
        crate::types::OrderbookInfo,
        crate::types::SnapshotEntry,
        crate::types::SnapshotId,

        crate::api::routes::SnapshotQuery,
        crate::api::routes::HealthResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "locations", description = "Scheduling status of every tracked region and structure"),
        (name = "snapshots", description = "Statistics of the snapshots currently retained on disk"),
        (name = "system", description = "Health check and OpenAPI spec"),
    )
)]
pub struct ApiDoc;
