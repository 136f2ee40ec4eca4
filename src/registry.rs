//! Shared view of locations and retained snapshots
//!
//! The scheduler worker is the only writer. The status API reads through the
//! same handle and always gets owned copies, never references into the maps.

use crate::types::{Location, LocationStatus, OrderbookInfo, SnapshotEntry, SnapshotId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Configured locations in registration order
    locations: Vec<LocationStatus>,
    snapshots: HashMap<SnapshotId, OrderbookInfo>,
}

/// Registry of location names, scheduling status and snapshot statistics
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<Inner>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a location with its display name
    ///
    /// Registering an id twice replaces the name and resets its status.
    pub async fn register_location(&self, location: Location, name: impl Into<String>) {
        let status = LocationStatus {
            id: location.id,
            kind: location.kind,
            name: name.into(),
            next_refresh: None,
            skipped: None,
            total_fetches: 0,
            last_error: None,
        };

        let mut inner = self.inner.write().await;
        match inner.locations.iter_mut().find(|s| s.id == location.id) {
            Some(existing) => *existing = status,
            None => inner.locations.push(status),
        }
    }

    /// Display name of a location
    pub async fn location_name(&self, location_id: u64) -> Option<String> {
        self.inner
            .read()
            .await
            .locations
            .iter()
            .find(|s| s.id == location_id)
            .map(|s| s.name.clone())
    }

    /// Apply a status update to a registered location
    ///
    /// Unknown ids are ignored.
    pub async fn update_location<F>(&self, location_id: u64, update: F)
    where
        F: FnOnce(&mut LocationStatus),
    {
        let mut inner = self.inner.write().await;
        if let Some(status) = inner.locations.iter_mut().find(|s| s.id == location_id) {
            update(status);
        }
    }

    /// Status of every location in registration order
    pub async fn locations(&self) -> Vec<LocationStatus> {
        self.inner.read().await.locations.clone()
    }

    /// Status of one location
    pub async fn location(&self, location_id: u64) -> Option<LocationStatus> {
        self.inner
            .read()
            .await
            .locations
            .iter()
            .find(|s| s.id == location_id)
            .cloned()
    }

    /// Register the statistics of a persisted snapshot
    ///
    /// Returns true if the id was not registered before.
    pub async fn insert_snapshot(&self, id: SnapshotId, info: OrderbookInfo) -> bool {
        self.inner.write().await.snapshots.insert(id, info).is_none()
    }

    /// Forget an evicted snapshot
    pub async fn remove_snapshot(&self, id: &SnapshotId) -> Option<OrderbookInfo> {
        self.inner.write().await.snapshots.remove(id)
    }

    /// Statistics of one snapshot
    pub async fn snapshot(&self, id: &SnapshotId) -> Option<OrderbookInfo> {
        self.inner.read().await.snapshots.get(id).cloned()
    }

    /// Every retained snapshot, newest first
    pub async fn snapshots(&self) -> Vec<SnapshotEntry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<SnapshotEntry> = inner
            .snapshots
            .iter()
            .map(|(id, info)| SnapshotEntry {
                id: id.clone(),
                info: info.clone(),
            })
            .collect();

        entries.sort_by(|a, b| {
            b.info
                .date
                .cmp(&a.info.date)
                .then_with(|| a.id.cmp(&b.id))
        });
        entries
    }

    /// Number of retained snapshots
    pub async fn snapshot_count(&self) -> usize {
        self.inner.read().await.snapshots.len()
    }
}
