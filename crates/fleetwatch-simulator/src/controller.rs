//! Publish loop controller.
//!
//! At most one continuous loop runs at a time. Starting while a loop is
//! running is a no-op; stopping cancels the loop and waits for it to wind
//! down. Inside the loop a failed publish is logged and the loop carries
//! on; the publisher reconnects by itself.

use std::sync::Arc;
use std::time::Duration;

use fleetwatch_broker::CoordinatePublisher;
use fleetwatch_core::codec;
use fleetwatch_types::{Position, VehicleId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SimulatorError;
use crate::generator::CoordinateGenerator;

struct RunningLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Publishes generated coordinates once or continuously.
pub struct PublishController<P> {
    publisher: Arc<P>,
    generator: CoordinateGenerator,
    interval: Duration,
    vehicle_id: Option<VehicleId>,
    running: Mutex<Option<RunningLoop>>,
}

impl<P> PublishController<P>
where
    P: CoordinatePublisher + 'static,
{
    /// Create a controller publishing through `publisher` every `interval`
    /// once started.
    pub fn new(publisher: P, generator: CoordinateGenerator, interval: Duration) -> Self {
        Self {
            publisher: Arc::new(publisher),
            generator,
            interval: interval.max(Duration::from_millis(1)),
            vehicle_id: None,
            running: Mutex::new(None),
        }
    }

    /// Tag every payload with `vehicle_id`.
    #[must_use]
    pub fn with_vehicle_id(mut self, vehicle_id: VehicleId) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }

    /// Generate and publish one position.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Broker`] if the publisher cannot reach the
    /// broker.
    pub async fn publish_once(&self) -> Result<Position, SimulatorError> {
        publish_position(self.publisher.as_ref(), &self.generator, self.vehicle_id).await
    }

    /// Start the continuous loop. Returns `false` if one is already running.
    pub async fn start_continuous(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|l| !l.task.is_finished()) {
            debug!("continuous publishing already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(publish_loop(
            Arc::clone(&self.publisher),
            self.generator,
            self.vehicle_id,
            self.interval,
            cancel.clone(),
        ));
        *running = Some(RunningLoop { cancel, task });
        info!(interval_ms = self.interval.as_millis(), "continuous publishing started");
        true
    }

    /// Stop the continuous loop. Returns `false` if none was running.
    pub async fn stop_continuous(&self) -> bool {
        let Some(running) = self.running.lock().await.take() else {
            return false;
        };
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "publish loop ended abnormally");
        }
        info!("continuous publishing stopped");
        true
    }

    /// Whether a continuous loop is active.
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|l| !l.task.is_finished())
    }

    /// Stop the loop and disconnect the publisher.
    pub async fn shutdown(&self) {
        self.stop_continuous().await;
        self.publisher.shutdown().await;
    }
}

async fn publish_position<P: CoordinatePublisher>(
    publisher: &P,
    generator: &CoordinateGenerator,
    vehicle_id: Option<VehicleId>,
) -> Result<Position, SimulatorError> {
    let position = generator.generate();
    let payload = match vehicle_id {
        Some(id) => codec::encode_for_vehicle(&position, id),
        None => codec::encode(&position),
    };
    publisher.publish(payload).await?;
    info!(
        latitude = position.latitude,
        longitude = position.longitude,
        timestamp = position.timestamp,
        "coordinates published"
    );
    Ok(position)
}

async fn publish_loop<P: CoordinatePublisher>(
    publisher: Arc<P>,
    generator: CoordinateGenerator,
    vehicle_id: Option<VehicleId>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        let published = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = publish_position(publisher.as_ref(), &generator, vehicle_id) => result,
        };
        if let Err(e) = published {
            warn!(error = %e, "publish failed, will retry next interval");
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!("publish loop exited");
}
