//! End-to-end relay pipeline over the in-memory broker.
//!
//! Connection manager + telemetry subscriber + store + broadcaster, run on
//! paused tokio time so backoff and liveness waits cost nothing.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use fleetwatch_broker::{
    ConnectionManager, ConnectionState, MemoryBroker, MemoryTransport, RetryPolicy,
};
use fleetwatch_core::targeting::FirstVehicle;
use fleetwatch_core::{Broadcaster, TelemetrySubscriber, VehicleStore, seed};
use fleetwatch_types::{Position, VehicleId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const TOPIC: &str = "vehicle/coordinates";
const PAYLOAD: &[u8] = br#"{"Latitude":34.05,"Longitude":-118.25,"Timestamp":1700000000}"#;

struct Relay {
    broker: MemoryBroker,
    store: VehicleStore,
    broadcaster: Broadcaster,
    manager: ConnectionManager<MemoryTransport, TelemetrySubscriber>,
}

fn relay(broker: MemoryBroker) -> Relay {
    let store = VehicleStore::new(seed::vehicles_from(&seed::default_fleet())).unwrap();
    let broadcaster = Broadcaster::default();
    let subscriber =
        TelemetrySubscriber::new(store.clone(), broadcaster.clone(), Arc::new(FirstVehicle));
    let manager = ConnectionManager::new(
        MemoryTransport::new(broker.clone()),
        subscriber,
        TOPIC,
        "backend_subscriber",
        RetryPolicy::default(),
    );
    Relay {
        broker,
        store,
        broadcaster,
        manager,
    }
}

#[tokio::test(start_paused = true)]
async fn unreachable_broker_is_retried_until_subscribed() {
    let broker = MemoryBroker::new();
    broker.set_reachable(false);
    let Relay {
        broker,
        store,
        broadcaster,
        manager,
    } = relay(broker);
    let mut updates = broadcaster.subscribe();
    let mut state = manager.state();
    let cancel = CancellationToken::new();
    let started = Instant::now();
    let task = tokio::spawn(manager.run(cancel.clone()));

    state
        .wait_for(|s| *s == ConnectionState::Failed)
        .await
        .unwrap();
    broker.set_reachable(true);
    state
        .wait_for(|s| *s == ConnectionState::Subscribed)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(broker.connect_attempts(), 2);

    broker.publish(TOPIC, PAYLOAD.to_vec()).unwrap();
    let update = updates.recv().await.unwrap();
    assert_eq!(update.id, VehicleId::new(1));
    assert_eq!(update.registration, "ABC-123");
    assert_eq!(update.position(), Position::new(34.05, -118.25, 1_700_000_000));
    assert_eq!(
        store.get(VehicleId::new(1)).await.unwrap(),
        Position::new(34.05, -118.25, 1_700_000_000)
    );

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    assert_eq!(broker.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_leaves_store_and_channel_untouched() {
    let Relay {
        broker,
        store,
        broadcaster,
        manager,
    } = relay(MemoryBroker::new());
    let before = store.list_all().await;
    let mut updates = broadcaster.subscribe();
    let mut state = manager.state();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(manager.run(cancel.clone()));

    state
        .wait_for(|s| *s == ConnectionState::Subscribed)
        .await
        .unwrap();
    broker.publish(TOPIC, br#"{"Latitude":"bad"}"#.to_vec()).unwrap();
    broker.publish(TOPIC, PAYLOAD.to_vec()).unwrap();

    // Only the valid message comes through.
    let update = updates.recv().await.unwrap();
    assert_eq!(update.timestamp, 1_700_000_000);
    assert!(updates.try_recv().is_err());

    let after = store.list_all().await;
    assert_eq!(after.get(1..), before.get(1..));

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn severed_session_is_replaced_after_liveness_check() {
    let Relay {
        broker,
        broadcaster,
        manager,
        ..
    } = relay(MemoryBroker::new());
    let mut updates = broadcaster.subscribe();
    let mut state = manager.state();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(manager.run(cancel.clone()));

    state
        .wait_for(|s| *s == ConnectionState::Subscribed)
        .await
        .unwrap();
    assert_eq!(broker.connect_attempts(), 1);

    broker.sever();
    while broker.connect_attempts() < 2 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    state
        .wait_for(|s| *s == ConnectionState::Subscribed)
        .await
        .unwrap();

    broker.publish(TOPIC, PAYLOAD.to_vec()).unwrap();
    let update = updates.recv().await.unwrap();
    assert_eq!(update.id, VehicleId::new(1));

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(broker.disconnects(), 1);
}
