//! Process lifecycle: start-up wiring and graceful shutdown

use crate::config::Config;
use crate::error::Result;
use crate::esi::{EsiClient, TokenManager};
use crate::registry::Registry;
use crate::retention::RetentionStore;
use crate::scheduler::{LocationTask, Scheduler};
use crate::snapshot::prepare_output_dir;
use crate::types::Location;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long shutdown waits for the background loops
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Running fetcher: the scheduler worker plus, when structures are
/// configured, the token refresher
pub struct OrderbookFetcher {
    config: Arc<Config>,
    registry: Registry,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl OrderbookFetcher {
    /// Prepare the output directory, obtain the first access token, resolve
    /// location names and spawn the background loops
    ///
    /// Fails if the output directory is unusable or the first token refresh
    /// is rejected. Name lookups that fail fall back to `Location <id>`.
    pub async fn start(config: Config) -> Result<Self> {
        config.validate()?;

        let removed = prepare_output_dir(&config.output_dir).await?;
        info!(
            output_dir = %config.output_dir.display(),
            stale_removed = removed,
            "Output directory ready"
        );

        let http = EsiClient::http_client(&config.esi)?;

        let mut token_manager = None;
        if config.needs_token() {
            let mut manager = TokenManager::new(
                http.clone(),
                &config.esi,
                config.client_id.as_str(),
                config.refresh_token.as_str(),
            );
            let token = manager.refresh_and_publish().await?;
            info!(expires_at = %token.expires_at, "Obtained initial access token");
            token_manager = Some(manager);
        }

        let reader = token_manager.as_ref().map(TokenManager::reader);
        let client = EsiClient::new(http, &config.esi, config.page_retry.clone(), reader)?;

        let registry = Registry::new();
        let retention =
            RetentionStore::new(config.retention_period, &config.output_dir, registry.clone());
        let mut scheduler = Scheduler::new(client.clone(), retention, registry.clone(), &config);

        for location in config.locations() {
            let name = resolve_name(&client, location).await;
            info!(location = %location, name = %name, "Tracking location");
            registry.register_location(location, name.clone()).await;
            scheduler.enqueue(LocationTask::new(location).with_name(name));
        }

        let cancel = CancellationToken::new();
        let mut handles = vec![tokio::spawn(scheduler.run(cancel.child_token()))];
        if let Some(manager) = token_manager {
            handles.push(tokio::spawn(manager.run(cancel.child_token())));
        }

        info!(
            regions = config.regions.len(),
            citadels = config.citadels.len(),
            retention_period = config.retention_period,
            interval = config.interval,
            "Orderbook fetcher started"
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            cancel,
            handles: Mutex::new(handles),
        })
    }

    /// Read-only view of locations and snapshots
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Configuration the fetcher was started with
    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Token cancelled when shutdown begins
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the background loops and wait for them to exit
    ///
    /// In-flight fetches are abandoned and their provisional files removed.
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown");
        self.cancel.cancel();

        let handles = std::mem::take(&mut *self.handles.lock().await);
        let join_all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all).await {
            Ok(()) => info!("Graceful shutdown complete"),
            Err(_) => warn!("Timeout waiting for background tasks, proceeding with shutdown"),
        }
        Ok(())
    }
}

/// Display name of a location, or a placeholder when the lookup fails
async fn resolve_name(client: &EsiClient, location: Location) -> String {
    match client.get_location_name(location).await {
        Ok(name) => name,
        Err(e) => {
            warn!(location = %location, error = %e, "Failed to resolve location name");
            format!("Location {}", location.id)
        }
    }
}
