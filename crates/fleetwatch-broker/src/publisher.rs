//! Publishing side: how the simulator puts coordinates on the topic.
//!
//! [`MqttPublisher`] connects lazily. The first publish creates the client
//! and spawns a task driving its event loop; later publishes reuse it. The
//! driver reconnects by itself after a drop, so a publish only fails when
//! no connection comes up within the connect timeout or the request queue
//! is full.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BrokerError;
use crate::mqtt::MqttSettings;

/// Puts encoded payloads on the coordinates topic.
pub trait CoordinatePublisher: Send + Sync {
    /// Publish one payload with at-least-once delivery.
    fn publish(&self, payload: Vec<u8>) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Disconnect and release the connection, if any.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}

/// Timing used by [`MqttPublisher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherTiming {
    /// How long a publish waits for the (re)connection.
    pub connect_timeout: Duration,
    /// Delay between reconnect attempts of the driver.
    pub reconnect_delay: Duration,
    /// Upper bound on the graceful disconnect.
    pub disconnect_timeout: Duration,
}

struct LiveClient {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
    driver: JoinHandle<()>,
}

/// Lazily connected MQTT publisher.
pub struct MqttPublisher {
    settings: MqttSettings,
    topic: String,
    client_id: String,
    timing: PublisherTiming,
    live: Mutex<Option<LiveClient>>,
}

impl MqttPublisher {
    /// Create a publisher; nothing is connected until the first publish.
    pub fn new(settings: MqttSettings, topic: &str, client_id: String, timing: PublisherTiming) -> Self {
        Self {
            settings,
            topic: topic.to_owned(),
            client_id,
            timing,
            live: Mutex::new(None),
        }
    }

    /// The MQTT client id this publisher connects with.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn start_client(&self) -> LiveClient {
        let (client, event_loop) = AsyncClient::new(
            self.settings.options(&self.client_id),
            self.settings.request_capacity.max(1),
        );
        let (connected_tx, connected) = watch::channel(false);
        let driver = tokio::spawn(drive(event_loop, connected_tx, self.timing.reconnect_delay));
        info!(
            client_id = %self.client_id,
            host = %self.settings.host,
            port = self.settings.port,
            "mqtt publisher started"
        );
        LiveClient {
            client,
            connected,
            driver,
        }
    }
}

impl CoordinatePublisher for MqttPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut live = self.live.lock().await;
        if live.as_ref().is_none_or(|client| client.driver.is_finished()) {
            *live = Some(self.start_client());
        }
        let Some(client) = live.as_mut() else {
            return Err(BrokerError::Connect(String::from("publisher client unavailable")));
        };

        let connected_now = *client.connected.borrow();
        if !connected_now {
            let ready = tokio::time::timeout(
                self.timing.connect_timeout,
                client.connected.wait_for(|connected| *connected),
            )
            .await
            .is_ok_and(|changed| changed.is_ok());
            if !ready {
                return Err(BrokerError::Connect(format!(
                    "no connection to {}:{} within {:?}",
                    self.settings.host, self.settings.port, self.timing.connect_timeout
                )));
            }
        }

        client
            .client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)
            .map_err(|e| BrokerError::Publish(e.to_string()))
    }

    async fn shutdown(&self) {
        let Some(live) = self.live.lock().await.take() else {
            return;
        };
        let LiveClient {
            client, mut driver, ..
        } = live;

        if let Err(e) = client.disconnect().await {
            debug!(error = %e, "publisher disconnect request not queued");
        }
        if tokio::time::timeout(self.timing.disconnect_timeout, &mut driver)
            .await
            .is_err()
        {
            warn!(client_id = %self.client_id, "publisher disconnect timed out, aborting driver");
            driver.abort();
        }
        info!(client_id = %self.client_id, "mqtt publisher disconnected");
    }
}

/// Poll the event loop until the client disconnects or is dropped.
async fn drive(mut event_loop: EventLoop, connected: watch::Sender<bool>, reconnect_delay: Duration) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                let ok = ack.code == ConnectReturnCode::Success;
                connected.send_replace(ok);
                if ok {
                    info!("publisher connected to broker");
                } else {
                    warn!(code = ?ack.code, "broker refused publisher connection");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.send_replace(false);
                return;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                connected.send_replace(false);
                return;
            }
            Err(e) => {
                connected.send_replace(false);
                warn!(error = %e, "publisher connection error, retrying");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}
