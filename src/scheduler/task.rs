//! Per-location scheduling state

use super::queue::Scheduled;
use crate::types::{Location, LocationStatus, SnapshotId};
use chrono::{DateTime, Utc};

/// Scheduling state of one configured location
///
/// Owned by the scheduler: a task is either in the queue or being serviced.
#[derive(Clone, Debug)]
pub struct LocationTask {
    /// The location this task fetches
    pub location: Location,
    /// Display name used in snapshot statistics
    pub name: String,
    /// When the location is serviced next
    pub next_refresh: DateTime<Utc>,
    /// Expiry cycles skipped since the last full fetch (None = never attempted)
    pub skipped: Option<u32>,
    /// Retained snapshot ids, a ring indexed by `total_fetches % period`
    pub snapshots: Vec<SnapshotId>,
    /// Completed full fetches
    pub total_fetches: u64,
    /// Failed cycles in a row (drives the failure backoff)
    pub consecutive_failures: u32,
}

impl LocationTask {
    /// Fresh task, due immediately
    pub fn new(location: Location) -> Self {
        Self {
            location,
            name: format!("Location {}", location.id),
            next_refresh: Utc::now(),
            skipped: None,
            snapshots: Vec::new(),
            total_fetches: 0,
            consecutive_failures: 0,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Copy the scheduling fields into a status record
    pub fn apply_to(&self, status: &mut LocationStatus) {
        status.next_refresh = Some(self.next_refresh);
        status.skipped = self.skipped;
        status.total_fetches = self.total_fetches;
    }
}

impl Scheduled for LocationTask {
    fn due_at(&self) -> DateTime<Utc> {
        self.next_refresh
    }
}

/// What the worker does with a task once it is due
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleAction {
    /// Only refresh the expiry with a HEAD probe
    SkipProbe,
    /// Fetch and persist the full order book
    FullFetch,
}

/// Decide between a skip probe and a full fetch
///
/// A task that was never attempted is always fetched. Otherwise one full
/// fetch happens every `interval` expiry cycles.
pub fn decide(task: &LocationTask, interval: u32) -> CycleAction {
    match task.skipped {
        Some(skipped) if interval > skipped.saturating_add(1) => CycleAction::SkipProbe,
        _ => CycleAction::FullFetch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_skips(skipped: Option<u32>) -> LocationTask {
        LocationTask {
            skipped,
            ..LocationTask::new(Location::region(10000002))
        }
    }

    #[test]
    fn never_attempted_task_fetches() {
        assert_eq!(decide(&task_with_skips(None), 4), CycleAction::FullFetch);
        assert_eq!(decide(&task_with_skips(None), 1), CycleAction::FullFetch);
    }

    #[test]
    fn interval_four_skips_three_cycles() {
        assert_eq!(decide(&task_with_skips(Some(0)), 4), CycleAction::SkipProbe);
        assert_eq!(decide(&task_with_skips(Some(2)), 4), CycleAction::SkipProbe);
        assert_eq!(decide(&task_with_skips(Some(3)), 4), CycleAction::FullFetch);
    }

    #[test]
    fn interval_one_or_zero_always_fetches() {
        assert_eq!(decide(&task_with_skips(Some(0)), 1), CycleAction::FullFetch);
        assert_eq!(decide(&task_with_skips(Some(0)), 0), CycleAction::FullFetch);
    }

    #[test]
    fn saturated_skip_count_fetches() {
        assert_eq!(
            decide(&task_with_skips(Some(u32::MAX)), u32::MAX),
            CycleAction::FullFetch
        );
    }

    #[test]
    fn new_task_has_fallback_name() {
        let task = LocationTask::new(Location::structure(1035466617946));
        assert_eq!(task.name, "Location 1035466617946");
        assert_eq!(task.with_name("Perimeter").name, "Perimeter");
    }
}
