//! Application state for the API server

use crate::{Config, Registry};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; both fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// Location and snapshot registry (read-only from the API's side)
    pub registry: Registry,

    /// Configuration the fetcher runs with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(registry: Registry, config: Arc<Config>) -> Self {
        Self { registry, config }
    }
}
