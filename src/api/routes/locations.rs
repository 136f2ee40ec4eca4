//! Location status handlers

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::LocationStatus;
use axum::{
    Json,
    extract::{Path, State},
};

/// GET /locations - Scheduling status of every location
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "locations",
    responses(
        (status = 200, description = "Locations in configuration order", body = Vec<LocationStatus>)
    )
)]
pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<LocationStatus>> {
    Json(state.registry.locations().await)
}

/// GET /locations/:id - Scheduling status of one location
#[utoipa::path(
    get,
    path = "/api/v1/locations/{id}",
    tag = "locations",
    params(
        ("id" = u64, Path, description = "Region or structure id")
    ),
    responses(
        (status = 200, description = "Location status", body = LocationStatus),
        (status = 404, description = "Location is not tracked", body = crate::error::ApiError)
    )
)]
pub async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<LocationStatus>> {
    state
        .registry
        .location(id)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("location {id}")))
}
