//! Relay wiring: one store, one broadcaster, one connection manager.

use std::sync::Arc;

use fleetwatch_broker::{BrokerTransport, ConnectionManager, ConnectionState, RetryPolicy};
use fleetwatch_core::{Broadcaster, FleetwatchConfig, TelemetrySubscriber, VehicleStore, seed, targeting};
use fleetwatch_observer::AppState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::RelayError;

/// A configured, not yet running relay.
pub struct Relay<T> {
    store: VehicleStore,
    broadcaster: Broadcaster,
    manager: ConnectionManager<T, TelemetrySubscriber>,
}

impl<T> Relay<T>
where
    T: BrokerTransport + Sync + 'static,
    T::Session: 'static,
{
    /// Seed the store from `config.fleet` and wire the subscriber to a
    /// connection manager over `transport`.
    pub fn new(config: &FleetwatchConfig, transport: T) -> Result<Self, RelayError> {
        let store = VehicleStore::new(seed::vehicles_from(&config.fleet))?;
        let broadcaster =
            Broadcaster::new(&config.relay.channel_name, config.relay.broadcast_capacity);
        let policy = targeting::policy_for(config.relay.targeting);
        info!(
            vehicles = config.fleet.len(),
            policy = policy.name(),
            channel = broadcaster.name(),
            "relay configured"
        );

        let subscriber = TelemetrySubscriber::new(store.clone(), broadcaster.clone(), policy);
        let manager = ConnectionManager::new(
            transport,
            subscriber,
            &config.broker.topic,
            &config.relay.client_id_prefix,
            RetryPolicy::from(&config.retry),
        );

        Ok(Self {
            store,
            broadcaster,
            manager,
        })
    }

    /// State for the query server, sharing this relay's store and channel.
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(self.store.clone(), self.broadcaster.clone()))
    }

    /// Start the connection manager on its own task.
    pub fn spawn(self, cancel: CancellationToken) -> RelayHandle {
        info!(client_id = self.manager.client_id(), "starting relay");
        let state = self.manager.state();
        let task = tokio::spawn(self.manager.run(cancel.clone()));
        RelayHandle {
            cancel,
            state,
            task,
        }
    }
}

/// A running relay.
pub struct RelayHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Observe the broker connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Cancel the relay and wait for the broker session to close.
    pub async fn shutdown(self) -> Result<(), RelayError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| RelayError::Task(format!("connection manager: {e}")))
    }
}
