//! MQTT transport backed by `rumqttc`.
//!
//! A session owns one [`AsyncClient`] and its [`EventLoop`]. Nothing moves
//! on the wire unless the event loop is polled, so every session operation
//! polls it until the packet it is waiting for shows up.

use std::time::Duration;

use fleetwatch_core::config::BrokerConfig;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use tracing::{debug, trace};

use crate::error::BrokerError;
use crate::transport::{BrokerSession, BrokerTransport, InboundMessage};

/// Where and how to reach the MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// Broker host name.
    pub host: String,
    /// Broker TCP port.
    pub port: u16,
    /// MQTT keep-alive (at least one second).
    pub keep_alive: Duration,
    /// Capacity of the client request queue.
    pub request_capacity: usize,
}

impl MqttSettings {
    /// Build settings from the `broker` config section.
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            keep_alive: config.keep_alive(),
            request_capacity: config.request_capacity.max(1),
        }
    }

    /// Client options for a clean session under `client_id`.
    pub fn options(&self, client_id: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, self.host.as_str(), self.port);
        options.set_keep_alive(self.keep_alive.max(Duration::from_secs(1)));
        options.set_clean_session(true);
        options
    }
}

/// [`BrokerTransport`] talking MQTT 3.1.1 over TCP.
#[derive(Debug, Clone)]
pub struct MqttTransport {
    settings: MqttSettings,
}

impl MqttTransport {
    /// Create a transport for the given broker.
    pub const fn new(settings: MqttSettings) -> Self {
        Self { settings }
    }
}

impl BrokerTransport for MqttTransport {
    type Session = MqttSession;

    async fn connect(&mut self, client_id: &str) -> Result<MqttSession, BrokerError> {
        let (client, mut event_loop) = AsyncClient::new(
            self.settings.options(client_id),
            self.settings.request_capacity.max(1),
        );

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(BrokerError::Connect(format!(
                            "broker refused connection: {:?}",
                            ack.code
                        )));
                    }
                    debug!(
                        host = %self.settings.host,
                        port = self.settings.port,
                        "mqtt session established"
                    );
                    return Ok(MqttSession {
                        client,
                        event_loop,
                        alive: true,
                    });
                }
                Ok(event) => trace!(?event, "mqtt event while connecting"),
                Err(e) => return Err(BrokerError::Connect(e.to_string())),
            }
        }
    }
}

/// An open MQTT session.
pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    alive: bool,
}

impl BrokerSession for MqttSession {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(BrokerError::Subscribe(format!(
                            "broker rejected subscription to {topic}"
                        )));
                    }
                    return Ok(());
                }
                Ok(event) => trace!(?event, "mqtt event while subscribing"),
                Err(e) => {
                    self.alive = false;
                    return Err(BrokerError::Subscribe(e.to_string()));
                }
            }
        }
    }

    async fn next_inbound(&mut self) -> Result<InboundMessage, BrokerError> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.alive = false;
                    return Err(BrokerError::ConnectionLost(String::from(
                        "broker closed the session",
                    )));
                }
                Ok(event) => trace!(?event, "mqtt event"),
                Err(e) => {
                    self.alive = false;
                    return Err(BrokerError::ConnectionLost(e.to_string()));
                }
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn disconnect(mut self) -> Result<(), BrokerError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BrokerError::Disconnect(e.to_string()))?;

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(BrokerError::Disconnect(e.to_string())),
            }
        }
    }
}
