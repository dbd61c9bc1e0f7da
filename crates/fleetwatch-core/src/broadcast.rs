//! Fan-out of vehicle updates to live-view clients.
//!
//! [`Broadcaster`] wraps a [`tokio::sync::broadcast`] channel. Sending never
//! waits on receivers: each live-view connection drains its own receiver,
//! so a slow client only lags itself (and skips ahead once it falls more
//! than the channel capacity behind). A client that subscribes starts with
//! the next update; nothing is replayed.

use std::sync::Arc;

use fleetwatch_types::VehicleUpdate;
use tokio::sync::broadcast;
use tracing::trace;

/// Default name of the live-view channel.
pub const DEFAULT_CHANNEL: &str = "ReceiveVehicleUpdate";

/// Default number of updates buffered per receiver before it lags.
pub const DEFAULT_CAPACITY: usize = 256;

/// Named fire-and-forget broadcast channel for [`VehicleUpdate`]s.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    name: Arc<str>,
    tx: broadcast::Sender<VehicleUpdate>,
}

impl Broadcaster {
    /// Create a channel with the given name and per-receiver capacity.
    ///
    /// A capacity of zero is bumped to one.
    pub fn new(name: &str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name: Arc::from(name),
            tx,
        }
    }

    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new live-view receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<VehicleUpdate> {
        self.tx.subscribe()
    }

    /// Push an update to every current receiver without waiting.
    ///
    /// Returns how many receivers the update was queued for; `0` just means
    /// nobody is watching.
    pub fn broadcast(&self, update: &VehicleUpdate) -> usize {
        // send only errors when there are no receivers.
        let receivers = self.tx.send(update.clone()).unwrap_or(0);
        trace!(channel = %self.name, vehicle_id = %update.id, receivers, "update broadcast");
        receivers
    }

    /// Number of connected receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL, DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fleetwatch_types::VehicleId;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    use super::*;

    fn update(timestamp: u64) -> VehicleUpdate {
        VehicleUpdate {
            id: VehicleId::new(1),
            registration: String::from("ABC-123"),
            latitude: 34.05,
            longitude: -118.25,
            timestamp,
        }
    }

    #[test]
    fn broadcast_without_receivers_is_not_an_error() {
        let broadcaster = Broadcaster::default();
        assert_eq!(broadcaster.broadcast(&update(1)), 0);
        assert_eq!(broadcaster.name(), DEFAULT_CHANNEL);
    }

    #[tokio::test]
    async fn every_receiver_gets_the_update() {
        let broadcaster = Broadcaster::new("test", 8);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        assert_eq!(broadcaster.broadcast(&update(5)), 2);
        assert_eq!(a.recv().await.unwrap().timestamp, 5);
        assert_eq!(b.recv().await.unwrap().timestamp, 5);
    }

    #[test]
    fn late_subscriber_gets_no_backlog() {
        let broadcaster = Broadcaster::new("test", 8);
        let _early = broadcaster.subscribe();
        broadcaster.broadcast(&update(1));

        let mut late = broadcaster.subscribe();
        assert_eq!(late.try_recv().unwrap_err(), TryRecvError::Empty);
        broadcaster.broadcast(&update(2));
        assert_eq!(late.try_recv().unwrap().timestamp, 2);
    }

    #[tokio::test]
    async fn slow_receiver_lags_without_blocking_others() {
        let broadcaster = Broadcaster::new("test", 2);
        let mut slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        for ts in 1..=5 {
            broadcaster.broadcast(&update(ts));
            assert_eq!(fast.recv().await.unwrap().timestamp, ts);
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(slow.recv().await.unwrap().timestamp, 4);
    }

    #[test]
    fn dropped_receivers_are_released() {
        let broadcaster = Broadcaster::new("test", 4);
        let rx = broadcaster.subscribe();
        assert_eq!(broadcaster.receiver_count(), 1);
        drop(rx);
        assert_eq!(broadcaster.receiver_count(), 0);
        assert_eq!(broadcaster.broadcast(&update(1)), 0);
    }
}
