//! Shared application state for the query server.

use fleetwatch_core::{Broadcaster, VehicleStore};
use fleetwatch_types::VehicleUpdate;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. Both fields are cheap handles onto the relay's store and
/// live-view channel.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The relay's vehicle store (read-only from here).
    pub store: VehicleStore,
    /// The live-view channel `WebSocket` clients subscribe to.
    pub broadcaster: Broadcaster,
}

impl AppState {
    /// Create state over an existing store and broadcaster.
    pub const fn new(store: VehicleStore, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// Subscribe to the live-view channel.
    ///
    /// Returns a receiver that yields every [`VehicleUpdate`] broadcast
    /// from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<VehicleUpdate> {
        self.broadcaster.subscribe()
    }
}
