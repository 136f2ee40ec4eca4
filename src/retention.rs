//! Bounded retention of snapshots per location
//!
//! Each location keeps at most `period` snapshots. The ring is a plain vector
//! indexed by `total_fetches % period`; once full, the slot about to be
//! overwritten always holds the oldest surviving snapshot.

use crate::registry::Registry;
use crate::scheduler::LocationTask;
use crate::snapshot::snapshot_path;
use crate::types::{OrderbookInfo, SnapshotId};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Rotates persisted snapshots and keeps their statistics registered
#[derive(Clone)]
pub struct RetentionStore {
    period: u32,
    output_dir: PathBuf,
    registry: Registry,
}

impl RetentionStore {
    /// `period == 0` keeps every snapshot forever
    pub fn new(period: u32, output_dir: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            period,
            output_dir: output_dir.into(),
            registry,
        }
    }

    /// Record a finalized snapshot for `task`
    ///
    /// Returns the id of the evicted snapshot, if one was rotated out. A
    /// snapshot id the task already retains only refreshes its statistics.
    pub async fn record(
        &self,
        task: &mut LocationTask,
        id: SnapshotId,
        info: OrderbookInfo,
    ) -> Option<SnapshotId> {
        if task.snapshots.contains(&id) {
            debug!(snapshot = %id, "Snapshot already retained, refreshing statistics");
            self.registry.insert_snapshot(id, info).await;
            return None;
        }

        let period = u64::from(self.period);
        let mut evicted = None;

        if period == 0 {
            if !self.registry.insert_snapshot(id, info).await {
                return None;
            }
            task.total_fetches += 1;
            return None;
        }

        if task.total_fetches < period {
            task.snapshots.push(id.clone());
        } else {
            let index = (task.total_fetches % period) as usize;
            match task.snapshots.get_mut(index) {
                Some(slot) => {
                    let old = std::mem::replace(slot, id.clone());
                    self.evict(&old).await;
                    evicted = Some(old);
                }
                None => task.snapshots.push(id.clone()),
            }
        }

        task.total_fetches += 1;
        self.registry.insert_snapshot(id, info).await;
        evicted
    }

    /// Delete an evicted snapshot's file and statistics
    async fn evict(&self, id: &SnapshotId) {
        let path = snapshot_path(&self.output_dir, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(snapshot = %id, "Evicted snapshot"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(snapshot = %id, "Evicted snapshot was already gone");
            }
            Err(e) => warn!(
                snapshot = %id,
                path = %path.display(),
                error = %e,
                "Failed to delete evicted snapshot"
            ),
        }
        self.registry.remove_snapshot(id).await;
    }
}
