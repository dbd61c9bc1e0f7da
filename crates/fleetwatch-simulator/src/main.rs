//! Vehicle simulator entry point for Fleetwatch.
//!
//! Serves the control API and publishes random coordinates on the MQTT
//! topic on request. The MQTT connection opens with the first publish.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use fleetwatch_broker::{MqttPublisher, MqttSettings, PublisherTiming, client_id};
use fleetwatch_core::FleetwatchConfig;
use fleetwatch_core::config::CONFIG_FILE;
use fleetwatch_simulator::{CoordinateGenerator, PublishController, SimulatorError, build_router};
use fleetwatch_types::VehicleId;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// Loads `fleetwatch-config.yaml` (defaults if absent) and serves the
/// control API until Ctrl+C, then stops the loop and disconnects.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the control server
/// cannot bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config =
        FleetwatchConfig::load_or_default(Path::new(CONFIG_FILE)).map_err(SimulatorError::from)?;

    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    let sim = &config.simulator;
    let publisher = MqttPublisher::new(
        MqttSettings::from_config(&config.broker),
        &config.broker.topic,
        client_id(&sim.client_id_prefix),
        PublisherTiming {
            connect_timeout: config.retry.connect_timeout(),
            reconnect_delay: config.retry.backoff(),
            disconnect_timeout: config.retry.disconnect_timeout(),
        },
    );
    info!(
        client_id = publisher.client_id(),
        broker_host = %config.broker.host,
        broker_port = config.broker.port,
        topic = %config.broker.topic,
        "fleetwatch-simulator starting"
    );

    let generator = CoordinateGenerator::new(sim.bounds).map_err(SimulatorError::from)?;
    let mut controller = PublishController::new(publisher, generator, sim.publish_interval());
    if let Some(id) = sim.vehicle_id {
        info!(vehicle_id = id, "tagging payloads with a vehicle id");
        controller = controller.with_vehicle_id(VehicleId::new(id));
    }
    let controller = Arc::new(controller);

    let addr: SocketAddr = format!("{}:{}", sim.host, sim.port)
        .parse()
        .map_err(|e| SimulatorError::Server(format!("invalid address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SimulatorError::Server(format!("bind failed on {addr}: {e}")))?;
    info!(%addr, "control server listening");

    axum::serve(listener, build_router(Arc::clone(&controller)))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl+C received, shutting down");
        })
        .await
        .map_err(|e| SimulatorError::Server(format!("serve error: {e}")))?;

    controller.shutdown().await;
    info!("fleetwatch-simulator stopped");
    Ok(())
}
