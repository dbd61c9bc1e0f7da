//! Transport seam between the connection manager and a concrete broker.
//!
//! [`ConnectionManager`](crate::ConnectionManager) only drives these two
//! traits. [`MqttTransport`](crate::MqttTransport) talks to a real broker;
//! [`MemoryTransport`](crate::MemoryTransport) is an in-process stand-in.

use std::future::Future;

use crate::error::BrokerError;

/// One message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Opens sessions to a broker.
pub trait BrokerTransport: Send {
    /// Session type produced by a successful connect.
    type Session: BrokerSession;

    /// Open a fresh (clean) session under `client_id`.
    fn connect(
        &mut self,
        client_id: &str,
    ) -> impl Future<Output = Result<Self::Session, BrokerError>> + Send;
}

/// An open broker session.
pub trait BrokerSession: Send {
    /// Subscribe to `topic` with at-least-once delivery and wait for the
    /// broker's acknowledgement.
    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Wait for the next message on a subscribed topic.
    ///
    /// Must be cancel safe: the manager races it against its liveness
    /// timer and shutdown.
    fn next_inbound(&mut self) -> impl Future<Output = Result<InboundMessage, BrokerError>> + Send;

    /// Whether the session still looks connected.
    fn is_alive(&self) -> bool;

    /// Close the session gracefully.
    fn disconnect(self) -> impl Future<Output = Result<(), BrokerError>> + Send;
}
