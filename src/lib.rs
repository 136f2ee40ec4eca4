//! # orderbook-fetcher
//!
//! Periodically snapshots EVE Online market order books from ESI.
//!
//! Every configured location (public region or player-owned structure) is
//! re-fetched when its upstream cache expires. Snapshots are streamed to CSV
//! files, rotated per location once a retention limit is reached, and their
//! statistics are exposed through a small read-only HTTP API.
//!
//! ## Quick Start
//!
//! ```no_run
//! use orderbook_fetcher::{Config, OrderbookFetcher, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         regions: vec![10000002],
//!         retention_period: 12,
//!         ..Default::default()
//!     };
//!
//!     let fetcher = OrderbookFetcher::start(config).await?;
//!
//!     // Inspect what has been fetched so far
//!     for location in fetcher.registry().locations().await {
//!         println!("{} next refresh {:?}", location.name, location.next_refresh);
//!     }
//!
//!     run_with_shutdown(fetcher).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Read-only status API
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// ESI market client and access tokens
pub mod esi;
/// Start-up and shutdown
pub mod fetcher;
/// Location and snapshot registry
pub mod registry;
/// Snapshot rotation
pub mod retention;
/// Retry and backoff
pub mod retry;
/// Expiry-driven refresh scheduler
pub mod scheduler;
/// Snapshot files on disk
pub mod snapshot;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, AuthError, Error, Result, ToHttpStatus};
pub use esi::{EsiClient, PageSink, SnapshotPage, TokenManager, TokenReader};
pub use fetcher::OrderbookFetcher;
pub use registry::Registry;
pub use retention::RetentionStore;
pub use scheduler::{LocationTask, RefreshQueue, Scheduler};
pub use types::{
    Location, LocationKind, LocationStatus, MarketOrder, OrderbookInfo, SnapshotEntry, SnapshotId,
};

/// Block until SIGTERM/SIGINT (Ctrl+C off Unix), then shut the fetcher down
pub async fn run_with_shutdown(fetcher: OrderbookFetcher) -> Result<()> {
    wait_for_signal().await;
    fetcher.shutdown().await
}

/// Wait for SIGTERM or SIGINT
///
/// Falls back to `ctrl_c` when neither handler can be registered.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    fn register(kind: SignalKind, name: &str) -> Option<Signal> {
        signal(kind)
            .inspect_err(|e| tracing::warn!(signal = name, error = %e, "Signal handler unavailable"))
            .ok()
    }

    async fn recv(signal: Option<&mut Signal>) {
        match signal {
            Some(signal) => {
                signal.recv().await;
            }
            None => std::future::pending().await,
        }
    }

    let mut sigterm = register(SignalKind::terminate(), "SIGTERM");
    let mut sigint = register(SignalKind::interrupt(), "SIGINT");

    if sigterm.is_none() && sigint.is_none() {
        tracing::error!("No signal handlers registered, waiting on ctrl_c");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    tokio::select! {
        _ = recv(sigterm.as_mut()) => tracing::info!("Received SIGTERM"),
        _ = recv(sigint.as_mut()) => tracing::info!("Received SIGINT"),
    }
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
}
