//! Snapshot statistics handlers

use super::SnapshotQuery;
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{OrderbookInfo, SnapshotEntry, SnapshotId};
use axum::{
    Json,
    extract::{Path, Query, State},
};

/// GET /snapshots - Retained snapshots, newest first
#[utoipa::path(
    get,
    path = "/api/v1/snapshots",
    tag = "snapshots",
    params(SnapshotQuery),
    responses(
        (status = 200, description = "Retained snapshots", body = Vec<SnapshotEntry>)
    )
)]
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Json<Vec<SnapshotEntry>> {
    let snapshots = state
        .registry
        .snapshots()
        .await
        .into_iter()
        .filter(|entry| {
            query
                .location_id
                .is_none_or(|id| entry.info.location_id == id)
        })
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();

    Json(snapshots)
}

/// GET /snapshots/:id - Statistics of one snapshot
#[utoipa::path(
    get,
    path = "/api/v1/snapshots/{id}",
    tag = "snapshots",
    params(
        ("id" = String, Path, description = "Snapshot file name, e.g. 10000002_1760000000.csv")
    ),
    responses(
        (status = 200, description = "Snapshot statistics", body = OrderbookInfo),
        (status = 404, description = "Snapshot is not retained", body = crate::error::ApiError)
    )
)]
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderbookInfo>> {
    let id = SnapshotId(id);
    state
        .registry
        .snapshot(&id)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("snapshot {id}")))
}
