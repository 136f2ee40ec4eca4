//! Route handlers for the status API
//!
//! - [`locations`] - Scheduling status of every tracked location
//! - [`snapshots`] - Statistics of retained snapshots
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};

mod locations;
mod snapshots;
mod system;

pub use locations::*;
pub use snapshots::*;
pub use system::*;

/// Query parameters for GET /snapshots
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SnapshotQuery {
    /// Only snapshots of this location
    pub location_id: Option<u64>,
    /// Maximum number of snapshots to return, newest first
    pub limit: Option<usize>,
}

/// Response for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the server answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Number of tracked locations
    pub locations: usize,
    /// Number of retained snapshots
    pub snapshots: usize,
}
