//! In-process broker for tests and local runs without MQTT.
//!
//! [`MemoryBroker`] is a shared handle. Publishing on it reaches every
//! [`MemoryTransport`] session subscribed to the topic. It can be made
//! unreachable (connects and publishes fail) and can sever live sessions,
//! which then report themselves dead at the next liveness check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::BrokerError;
use crate::publisher::CoordinatePublisher;
use crate::transport::{BrokerSession, BrokerTransport, InboundMessage};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Inner {
    reachable: AtomicBool,
    epoch: AtomicU64,
    connect_attempts: AtomicUsize,
    disconnects: AtomicUsize,
    published: AtomicUsize,
    tx: broadcast::Sender<InboundMessage>,
}

/// Shared in-memory broker.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    /// Create a reachable broker with no sessions.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                reachable: AtomicBool::new(true),
                epoch: AtomicU64::new(0),
                connect_attempts: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                published: AtomicUsize::new(0),
                tx,
            }),
        }
    }

    /// Make the broker accept or refuse connections and publishes.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Whether connections are currently accepted.
    pub fn is_reachable(&self) -> bool {
        self.inner.reachable.load(Ordering::SeqCst)
    }

    /// Drop every live session without telling it.
    pub fn sever(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Publish `payload` on `topic` to all matching subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Publish`] while the broker is unreachable.
    pub fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if !self.is_reachable() {
            return Err(BrokerError::Publish(String::from("broker unreachable")));
        }
        self.inner.published.fetch_add(1, Ordering::SeqCst);
        // No subscribers is fine, the message is simply not retained.
        let _ = self.inner.tx.send(InboundMessage {
            topic: topic.to_owned(),
            payload,
        });
        Ok(())
    }

    /// Observe everything published, on any topic.
    pub fn watch(&self) -> broadcast::Receiver<InboundMessage> {
        self.inner.tx.subscribe()
    }

    /// Number of connect attempts, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of graceful disconnects.
    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    /// Number of accepted publishes.
    pub fn published(&self) -> usize {
        self.inner.published.load(Ordering::SeqCst)
    }

    fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// [`BrokerTransport`] connecting to a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    broker: MemoryBroker,
}

impl MemoryTransport {
    /// Create a transport for `broker`.
    pub const fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }
}

impl BrokerTransport for MemoryTransport {
    type Session = MemorySession;

    async fn connect(&mut self, client_id: &str) -> Result<MemorySession, BrokerError> {
        self.broker
            .inner
            .connect_attempts
            .fetch_add(1, Ordering::SeqCst);
        if !self.broker.is_reachable() {
            return Err(BrokerError::Connect(format!(
                "broker unreachable for {client_id}"
            )));
        }
        Ok(MemorySession {
            epoch: self.broker.epoch(),
            broker: self.broker.clone(),
            subscription: None,
        })
    }
}

/// A session on a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemorySession {
    broker: MemoryBroker,
    epoch: u64,
    subscription: Option<(String, broadcast::Receiver<InboundMessage>)>,
}

impl MemorySession {
    fn severed(&self) -> bool {
        self.broker.epoch() != self.epoch
    }
}

impl BrokerSession for MemorySession {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.broker.is_reachable() || self.severed() {
            return Err(BrokerError::Subscribe(format!("no session for {topic}")));
        }
        self.subscription = Some((topic.to_owned(), self.broker.watch()));
        Ok(())
    }

    async fn next_inbound(&mut self) -> Result<InboundMessage, BrokerError> {
        let Some((topic, rx)) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            match rx.recv().await {
                Ok(message) if message.topic == *topic => {
                    if self.broker.epoch() != self.epoch {
                        return Err(BrokerError::ConnectionLost(String::from("session severed")));
                    }
                    return Ok(message);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    return Err(BrokerError::ConnectionLost(String::from("broker gone")));
                }
            }
        }
    }

    fn is_alive(&self) -> bool {
        !self.severed()
    }

    async fn disconnect(self) -> Result<(), BrokerError> {
        self.broker.inner.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`CoordinatePublisher`] publishing on a [`MemoryBroker`] topic.
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    broker: MemoryBroker,
    topic: String,
}

impl MemoryPublisher {
    /// Publish on `topic` of `broker`.
    pub fn new(broker: MemoryBroker, topic: &str) -> Self {
        Self {
            broker,
            topic: topic.to_owned(),
        }
    }
}

impl CoordinatePublisher for MemoryPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.broker.publish(&self.topic, payload)
    }

    async fn shutdown(&self) {
        self.broker.inner.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_broker_refuses_connects_and_publishes() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);
        let mut transport = MemoryTransport::new(broker.clone());

        assert!(matches!(
            transport.connect("c1").await,
            Err(BrokerError::Connect(_))
        ));
        assert!(matches!(
            broker.publish("t", vec![1]),
            Err(BrokerError::Publish(_))
        ));
        assert_eq!(broker.connect_attempts(), 1);
        assert_eq!(broker.published(), 0);
    }

    #[tokio::test]
    async fn subscribed_session_only_sees_its_topic() {
        let broker = MemoryBroker::new();
        let mut session = MemoryTransport::new(broker.clone())
            .connect("c1")
            .await
            .unwrap();
        session.subscribe("vehicle/coordinates").await.unwrap();

        broker.publish("other", b"skip".to_vec()).unwrap();
        broker.publish("vehicle/coordinates", b"keep".to_vec()).unwrap();

        let message = session.next_inbound().await.unwrap();
        assert_eq!(message.payload, b"keep");
    }

    #[tokio::test]
    async fn severed_session_reports_dead() {
        let broker = MemoryBroker::new();
        let session = MemoryTransport::new(broker.clone())
            .connect("c1")
            .await
            .unwrap();
        assert!(session.is_alive());
        broker.sever();
        assert!(!session.is_alive());
    }
}
