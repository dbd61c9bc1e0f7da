//! Telemetry subscriber: the relay's message callback.
//!
//! For every payload delivered on the subscribed topic the subscriber
//!
//! 1. decodes it with the [`codec`](crate::codec),
//! 2. resolves the target vehicle through the configured
//!    [`TargetingPolicy`],
//! 3. replaces that vehicle's position in the [`VehicleStore`],
//! 4. hands a [`VehicleUpdate`] to the [`Broadcaster`] without waiting for
//!    delivery.
//!
//! Any failure drops the single message and is logged; the next message
//! is processed normally.

use std::future::Future;
use std::sync::Arc;

use fleetwatch_types::VehicleUpdate;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::codec::{self, DecodeError};
use crate::store::{StoreError, VehicleStore};
use crate::targeting::TargetingPolicy;

/// Why a single message was dropped.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// No vehicle in the fleet matched the message.
    #[error("message could not be attributed to a known vehicle")]
    TargetNotFound,

    /// The resolved vehicle vanished from the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Receives messages delivered by a broker connection.
///
/// The connection manager awaits each call before polling the next
/// message, so implementations see messages in broker order.
pub trait MessageHandler: Send + Sync {
    /// Handle one message. Must not fail: errors are logged and swallowed.
    fn on_message(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send;
}

impl<H: MessageHandler> MessageHandler for Arc<H> {
    fn on_message(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send {
        (**self).on_message(topic, payload)
    }
}

/// Decodes telemetry, updates the store, and fans the result out.
#[derive(Debug, Clone)]
pub struct TelemetrySubscriber {
    store: VehicleStore,
    broadcaster: Broadcaster,
    policy: Arc<dyn TargetingPolicy>,
}

impl TelemetrySubscriber {
    /// Create a subscriber writing to `store` and publishing on
    /// `broadcaster`.
    pub fn new(
        store: VehicleStore,
        broadcaster: Broadcaster,
        policy: Arc<dyn TargetingPolicy>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            policy,
        }
    }

    /// Process one payload and return the update that was broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Decode`] for a malformed payload and
    /// [`IngestError::TargetNotFound`] when the targeting policy resolves
    /// no vehicle. In both cases the store is unchanged and nothing is
    /// broadcast.
    pub async fn handle(&self, payload: &[u8]) -> Result<VehicleUpdate, IngestError> {
        let message = codec::decode_message(payload)?;

        let fleet = self.store.ids().await;
        let target = self
            .policy
            .resolve(&message, &fleet)
            .ok_or(IngestError::TargetNotFound)?;

        let vehicle = self.store.set(target, message.position).await?;
        info!(
            vehicle_id = %vehicle.id,
            registration = %vehicle.registration,
            latitude = message.position.latitude,
            longitude = message.position.longitude,
            "vehicle position updated"
        );

        let update = VehicleUpdate::from_vehicle(&vehicle);
        let receivers = self.broadcaster.broadcast(&update);
        debug!(channel = self.broadcaster.name(), receivers, "update handed to broadcaster");

        Ok(update)
    }
}

impl MessageHandler for TelemetrySubscriber {
    async fn on_message(&self, topic: &str, payload: &[u8]) {
        debug!(topic, bytes = payload.len(), "telemetry message received");
        match self.handle(payload).await {
            Ok(_) => {}
            Err(IngestError::Decode(e)) => {
                warn!(topic, error = %e, "dropping malformed telemetry payload");
            }
            Err(IngestError::TargetNotFound) => {
                warn!(topic, policy = self.policy.name(), "dropping telemetry for unknown vehicle");
            }
            Err(e @ IngestError::Store(_)) => {
                warn!(topic, error = %e, "dropping telemetry update");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fleetwatch_types::{Position, Vehicle, VehicleId};
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::targeting::{FirstVehicle, PayloadVehicleId};

    fn store() -> VehicleStore {
        VehicleStore::new(vec![
            Vehicle::new(VehicleId::new(1), "ABC-123", "Toyota", "Corolla"),
            Vehicle::new(VehicleId::new(2), "XYZ-789", "Honda", "Civic"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn valid_payload_updates_first_vehicle_and_broadcasts() {
        let store = store();
        let broadcaster = Broadcaster::new("test", 8);
        let mut rx = broadcaster.subscribe();
        let subscriber = TelemetrySubscriber::new(store.clone(), broadcaster, Arc::new(FirstVehicle));

        subscriber
            .on_message(
                "vehicle/coordinates",
                br#"{"Latitude":34.05,"Longitude":-118.25,"Timestamp":1700000000}"#,
            )
            .await;

        let expected = Position::new(34.05, -118.25, 1_700_000_000);
        assert_eq!(store.get(VehicleId::new(1)).await.unwrap(), expected);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.id, VehicleId::new(1));
        assert_eq!(update.registration, "ABC-123");
        assert_eq!(update.position(), expected);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_without_broadcast() {
        let store = store();
        let before = store.list_all().await;
        let broadcaster = Broadcaster::new("test", 8);
        let mut rx = broadcaster.subscribe();
        let subscriber = TelemetrySubscriber::new(store.clone(), broadcaster, Arc::new(FirstVehicle));

        let err = subscriber.handle(br#"{"Latitude":"bad"}"#).await.unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));

        subscriber.on_message("vehicle/coordinates", b"{garbage").await;

        assert_eq!(store.list_all().await, before);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn bad_message_does_not_block_the_next_one() {
        let store = store();
        let subscriber = TelemetrySubscriber::new(
            store.clone(),
            Broadcaster::new("test", 8),
            Arc::new(FirstVehicle),
        );

        subscriber.on_message("t", b"nope").await;
        subscriber
            .on_message("t", br#"{"Latitude":1.0,"Longitude":2.0,"Timestamp":3}"#)
            .await;

        assert_eq!(
            store.get(VehicleId::new(1)).await.unwrap(),
            Position::new(1.0, 2.0, 3)
        );
    }

    #[tokio::test]
    async fn unresolved_target_is_dropped() {
        let store = store();
        let before = store.list_all().await;
        let broadcaster = Broadcaster::new("test", 8);
        let mut rx = broadcaster.subscribe();
        let subscriber =
            TelemetrySubscriber::new(store.clone(), broadcaster, Arc::new(PayloadVehicleId));

        let err = subscriber
            .handle(br#"{"VehicleId":42,"Latitude":1.0,"Longitude":2.0,"Timestamp":3}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::TargetNotFound));
        assert_eq!(store.list_all().await, before);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn payload_id_policy_updates_the_named_vehicle() {
        let store = store();
        let subscriber = TelemetrySubscriber::new(
            store.clone(),
            Broadcaster::new("test", 8),
            Arc::new(PayloadVehicleId),
        );

        let update = subscriber
            .handle(br#"{"VehicleId":2,"Latitude":5.0,"Longitude":6.0,"Timestamp":7}"#)
            .await
            .unwrap();

        assert_eq!(update.registration, "XYZ-789");
        assert_eq!(
            store.get(VehicleId::new(2)).await.unwrap(),
            Position::new(5.0, 6.0, 7)
        );
        assert_eq!(
            store.get(VehicleId::new(1)).await.unwrap(),
            Position::UNINITIALIZED
        );
    }
}
