//! Expiry-driven refresh scheduler
//!
//! One worker services every location in order of its next refresh instant.
//! Each cycle pops the earliest task, sleeps until its upstream cache expires
//! (plus a grace margin), then either probes the new expiry with a HEAD request
//! or fetches and persists the full order book, and finally requeues the task.
//!
//! Cancellation is observed while sleeping and while any request is in flight.
//! A cancelled cycle drops its task and removes the provisional snapshot file.

mod queue;
mod task;


pub use queue::{RefreshQueue, Scheduled};
pub use task::{CycleAction, LocationTask, decide};

use crate::config::{BackoffConfig, Config};
use crate::error::Result;
use crate::esi::EsiClient;
use crate::registry::Registry;
use crate::retention::RetentionStore;
use crate::retry::backoff_delay;
use crate::snapshot::SnapshotWriter;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Time to sleep before servicing a task due at `due`
///
/// Past-due tasks only wait out the grace margin, or not at all when they are
/// overdue by more than the margin.
pub fn wait_duration(due: DateTime<Utc>, now: DateTime<Utc>, grace: Duration) -> Duration {
    let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::zero());
    (due - now + grace).to_std().unwrap_or(Duration::ZERO)
}

/// The single refresh worker
pub struct Scheduler {
    queue: RefreshQueue<LocationTask>,
    client: EsiClient,
    retention: RetentionStore,
    registry: Registry,
    output_dir: PathBuf,
    interval: u32,
    grace: Duration,
    backoff: BackoffConfig,
}

impl Scheduler {
    /// Create a scheduler with an empty queue
    pub fn new(
        client: EsiClient,
        retention: RetentionStore,
        registry: Registry,
        config: &Config,
    ) -> Self {
        Self {
            queue: RefreshQueue::new(),
            client,
            retention,
            registry,
            output_dir: config.output_dir.clone(),
            interval: config.interval,
            grace: config.esi.expiry_grace,
            backoff: config.failure_backoff.clone(),
        }
    }

    /// Queue a task; call once per configured location before [`Scheduler::run`]
    pub fn enqueue(&mut self, task: LocationTask) {
        self.queue.enqueue(task);
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no task is queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run the worker until cancelled or the queue runs dry
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(locations = self.queue.len(), "Scheduler started");

        loop {
            let Some(mut task) = self.queue.dequeue_min() else {
                warn!("Refresh queue is empty, scheduler stopping");
                break;
            };

            let wait = wait_duration(task.next_refresh, Utc::now(), self.grace);
            debug!(
                location = %task.location,
                wait_secs = wait.as_secs(),
                "Waiting for location to expire"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let action = decide(&task, self.interval);
            let outcome = match action {
                CycleAction::SkipProbe => self.skip_probe(&mut task, &cancel).await,
                CycleAction::FullFetch => self.full_fetch(&mut task, &cancel).await,
            };

            let Some(outcome) = outcome else {
                info!(location = %task.location, "Cycle interrupted by shutdown");
                break;
            };

            let last_error = match outcome {
                Ok(()) => {
                    task.consecutive_failures = 0;
                    None
                }
                Err(e) => {
                    task.consecutive_failures = task.consecutive_failures.saturating_add(1);
                    let delay = backoff_delay(&self.backoff, task.consecutive_failures);
                    if !delay.is_zero() {
                        task.next_refresh = Utc::now()
                            + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                    }
                    error!(
                        location = %task.location,
                        ?action,
                        error = %e,
                        failures = task.consecutive_failures,
                        retry_in_secs = delay.as_secs(),
                        "Refresh cycle failed"
                    );
                    Some(e.to_string())
                }
            };

            self.publish(&task, last_error).await;
            self.queue.enqueue(task);
        }

        info!("Scheduler stopped");
    }

    /// Refresh the expiry without fetching the order book
    ///
    /// Returns `None` when cancelled.
    async fn skip_probe(
        &self,
        task: &mut LocationTask,
        cancel: &CancellationToken,
    ) -> Option<Result<()>> {
        let probed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            probed = self.client.get_expiry(task.location) => probed,
        };

        Some(probed.map(|expiry| {
            task.next_refresh = expiry;
            task.skipped = Some(task.skipped.map_or(0, |s| s.saturating_add(1)));
            debug!(
                location = %task.location,
                skipped = ?task.skipped,
                expiry = %expiry,
                "Skipped full fetch"
            );
        }))
    }

    /// Fetch, persist and rotate a full snapshot
    ///
    /// Returns `None` when cancelled. Scheduling fields change only on success.
    async fn full_fetch(
        &self,
        task: &mut LocationTask,
        cancel: &CancellationToken,
    ) -> Option<Result<()>> {
        info!(location = %task.location, name = %task.name, "Fetching order book");

        let mut writer = SnapshotWriter::new(&self.output_dir, task.name.clone());
        let fetched = {
            let fetch = self.client.fetch_orders(task.location, &mut writer);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                fetched = fetch => Some(fetched),
            }
        };

        let summary = match fetched {
            None => {
                writer.discard().await;
                return None;
            }
            Some(Err(e)) => {
                writer.discard().await;
                return Some(Err(e));
            }
            Some(Ok(summary)) => summary,
        };

        let (id, info) = match writer.finish().await {
            Ok(done) => done,
            Err(e) => return Some(Err(e)),
        };

        task.next_refresh = summary.expiry;
        task.skipped = Some(0);
        if let Some(evicted) = self.retention.record(task, id.clone(), info).await {
            debug!(location = %task.location, snapshot = %evicted, "Rotated out snapshot");
        }

        info!(
            location = %task.location,
            snapshot = %id,
            pages = summary.pages,
            orders = summary.orders,
            next_refresh = %task.next_refresh,
            "Finished fetching location"
        );
        Some(Ok(()))
    }

    async fn publish(&self, task: &LocationTask, last_error: Option<String>) {
        self.registry
            .update_location(task.location.id, |status| {
                task.apply_to(status);
                status.last_error = last_error;
            })
            .await;
    }
}
