//! Broker plumbing for Fleetwatch.
//!
//! - [`ConnectionManager`] -- the subscribe-side state machine
//!   (connect, subscribe, serve, reconnect, disconnect)
//! - [`BrokerTransport`] / [`BrokerSession`] -- the seam it drives
//! - [`MqttTransport`] -- MQTT 3.1.1 via `rumqttc`
//! - [`MqttPublisher`] -- lazily connected publish side
//! - [`MemoryBroker`] -- in-process broker for tests and local runs

pub mod error;
pub mod manager;
pub mod memory;
pub mod mqtt;
pub mod publisher;
pub mod transport;

pub use error::BrokerError;
pub use manager::{ConnectionManager, ConnectionState, RetryPolicy, client_id};
pub use memory::{MemoryBroker, MemoryPublisher, MemoryTransport};
pub use mqtt::{MqttSettings, MqttTransport};
pub use publisher::{CoordinatePublisher, MqttPublisher, PublisherTiming};
pub use transport::{BrokerSession, BrokerTransport, InboundMessage};
