//! Telemetry relay entry point for Fleetwatch.
//!
//! The relay subscribes to the coordinates topic on the MQTT broker,
//! keeps each vehicle's last position in memory, and pushes every update
//! to connected live-view clients.
//!
//! # Architecture
//!
//! ```text
//! MQTT (vehicle/coordinates) --> Codec --> Targeting --> Store --> Broadcaster --> WebSocket
//!                                                          |
//!                                                          +--> REST query API
//! ```
//!
//! Broker outages never stop the process: the connection manager backs
//! off and reconnects until Ctrl+C.

mod error;
mod relay;

use std::path::Path;

use fleetwatch_broker::{MqttSettings, MqttTransport};
use fleetwatch_core::FleetwatchConfig;
use fleetwatch_core::config::CONFIG_FILE;
use fleetwatch_observer::start_server;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::RelayError;
use crate::relay::Relay;

/// Application entry point.
///
/// Loads `fleetwatch-config.yaml` (defaults if absent), starts the broker
/// connection manager, then serves the query API until Ctrl+C.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the query server
/// cannot bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = FleetwatchConfig::load_or_default(Path::new(CONFIG_FILE)).map_err(RelayError::from)?;

    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        broker_host = %config.broker.host,
        broker_port = config.broker.port,
        topic = %config.broker.topic,
        http_port = config.relay.port,
        "fleetwatch-relay starting"
    );

    let transport = MqttTransport::new(MqttSettings::from_config(&config.broker));
    let relay = Relay::new(&config, transport)?;
    let state = relay.app_state();

    let cancel = CancellationToken::new();
    let handle = relay.spawn(cancel.clone());

    let mut broker_state = handle.state();
    tokio::spawn(async move {
        while broker_state.changed().await.is_ok() {
            let current = *broker_state.borrow_and_update();
            info!(state = %current, "broker connection");
        }
    });

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, shutting down");
                on_signal.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl+C"),
        }
    });

    let served = start_server(&config.relay, state, cancel.clone()).await;

    cancel.cancel();
    handle.shutdown().await?;
    served.map_err(RelayError::from)?;

    info!("fleetwatch-relay stopped");
    Ok(())
}
