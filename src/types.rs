//! Core types for orderbook-fetcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Whether a location is a public region or an access-controlled structure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// Public region, no authentication required
    Region,
    /// Player-owned structure (citadel), requires a bearer token
    Structure,
}

impl LocationKind {
    /// Whether requests for this location need an access token
    pub fn requires_auth(&self) -> bool {
        matches!(self, LocationKind::Structure)
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationKind::Region => write!(f, "region"),
            LocationKind::Structure => write!(f, "structure"),
        }
    }
}

/// A market venue with its own cache-expiry cadence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Location {
    /// Region or structure id
    pub id: u64,
    /// Region or structure
    pub kind: LocationKind,
}

impl Location {
    /// Create a new location
    pub fn new(id: u64, kind: LocationKind) -> Self {
        Self { id, kind }
    }

    /// Public region
    pub fn region(id: u64) -> Self {
        Self::new(id, LocationKind::Region)
    }

    /// Access-controlled structure
    pub fn structure(id: u64) -> Self {
        Self::new(id, LocationKind::Structure)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Identifier of a persisted snapshot (its final file name)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    /// Snapshot id for a location and its first-page expiry
    pub fn for_location(location_id: u64, expiry: DateTime<Utc>) -> Self {
        Self(format!("{}_{}.csv", location_id, expiry.timestamp()))
    }

    /// File name of the snapshot
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One market order as returned by the upstream market endpoints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    /// Order duration in days
    pub duration: i32,
    /// Buy or sell side
    pub is_buy_order: bool,
    /// When the order was issued
    pub issued: DateTime<Utc>,
    /// Station or structure the order sits in
    pub location_id: i64,
    /// Minimum volume per fill
    pub min_volume: i32,
    /// Order id
    pub order_id: i64,
    /// Unit price
    pub price: f64,
    /// Range descriptor ("station", "region", "5", ...)
    pub range: String,
    /// Solar system id (structure endpoints omit it)
    #[serde(default)]
    pub system_id: i32,
    /// Item type id
    pub type_id: i32,
    /// Units left
    pub volume_remain: i32,
    /// Units at issue
    pub volume_total: i32,
}

/// Summary statistics of one persisted snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderbookInfo {
    /// Total number of orders
    pub order_count: u64,
    /// Number of sell orders
    pub sell_order_count: u64,
    /// Number of buy orders
    pub buy_order_count: u64,
    /// Display name of the location
    pub location_name: String,
    /// Location id
    pub location_id: u64,
    /// Region or structure
    pub kind: LocationKind,
    /// Expiry of the snapshot (first page's cache expiry)
    pub date: DateTime<Utc>,
}

impl OrderbookInfo {
    /// Empty statistics for a snapshot that is about to be written
    pub fn new(location: Location, location_name: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            order_count: 0,
            sell_order_count: 0,
            buy_order_count: 0,
            location_name: location_name.into(),
            location_id: location.id,
            kind: location.kind,
            date,
        }
    }

    /// Count one order
    pub fn add(&mut self, order: &MarketOrder) {
        self.order_count += 1;
        if order.is_buy_order {
            self.buy_order_count += 1;
        } else {
            self.sell_order_count += 1;
        }
    }
}

/// A snapshot id paired with its statistics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SnapshotEntry {
    /// Snapshot id (file name under the output directory)
    pub id: SnapshotId,
    /// Statistics of the snapshot
    pub info: OrderbookInfo,
}

/// Scheduling state of one location, as seen by the status API
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationStatus {
    /// Location id
    pub id: u64,
    /// Region or structure
    pub kind: LocationKind,
    /// Display name
    pub name: String,
    /// Next time the location is serviced
    pub next_refresh: Option<DateTime<Utc>>,
    /// Expiry cycles skipped since the last full fetch (None = never attempted)
    pub skipped: Option<u32>,
    /// Completed full fetches
    pub total_fetches: u64,
    /// Error of the most recent cycle, if it failed
    pub last_error: Option<String>,
}
