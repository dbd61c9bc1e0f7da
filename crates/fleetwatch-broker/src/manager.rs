//! Broker connection state machine.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribed
//!                     ^            |            |
//!                     |            v            |
//!                     +-------- Failed <--------+  (after backoff)
//! ```
//!
//! [`ConnectionManager::run`] owns the session for its whole life. While
//! subscribed it hands each inbound message to the [`MessageHandler`] in
//! arrival order and checks the session every liveness interval. A dead
//! session or a transport error starts over from `Connecting` with a fresh
//! clean session. Cancellation is honored before every connect, during
//! connect and subscribe, and during every wait.

use std::fmt;
use std::time::Duration;

use fleetwatch_core::MessageHandler;
use fleetwatch_core::config::RetryConfig;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::BrokerError;
use crate::transport::{BrokerSession, BrokerTransport, InboundMessage};

/// Where the connection manager currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; the initial and the final state.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected, subscription not yet acknowledged.
    Connected,
    /// Subscribed and receiving messages.
    Subscribed,
    /// The last connect or subscribe failed; waiting out the backoff.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Subscribed => "subscribed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Reconnect and liveness timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after a failed connect or subscribe.
    pub backoff: Duration,
    /// Period of the liveness check while subscribed.
    pub liveness_interval: Duration,
    /// Upper bound on one connect or subscribe.
    pub connect_timeout: Duration,
    /// Upper bound on the graceful disconnect.
    pub disconnect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            backoff: config.backoff(),
            liveness_interval: config.liveness_interval(),
            connect_timeout: config.connect_timeout(),
            disconnect_timeout: config.disconnect_timeout(),
        }
    }
}

/// Build a process-unique client id: `{prefix}_{uuid}`.
pub fn client_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4())
}

/// How one serving stretch ended.
enum ServeExit {
    Cancelled,
    Lost,
}

enum ServeEvent {
    Cancelled,
    LivenessCheck,
    Inbound(Result<InboundMessage, BrokerError>),
}

/// Keeps one subscription alive and feeds its messages to a handler.
pub struct ConnectionManager<T, H> {
    transport: T,
    handler: H,
    topic: String,
    client_id: String,
    retry: RetryPolicy,
    state: watch::Sender<ConnectionState>,
}

impl<T, H> ConnectionManager<T, H>
where
    T: BrokerTransport,
    H: MessageHandler,
{
    /// Create a manager subscribing to `topic`. The client id is generated
    /// once from `client_id_prefix` and reused across reconnects.
    pub fn new(
        transport: T,
        handler: H,
        topic: &str,
        client_id_prefix: &str,
        retry: RetryPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            handler,
            topic: topic.to_owned(),
            client_id: client_id(client_id_prefix),
            retry,
            state,
        }
    }

    /// The client id used for every connect.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(client_id = %self.client_id, from = %previous, to = %next, "connection state");
        }
    }

    /// Run until `cancel` fires. Never returns an error: every broker
    /// failure is logged and retried.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(client_id = %self.client_id, topic = %self.topic, "connection manager starting");

        while !cancel.is_cancelled() {
            self.set_state(ConnectionState::Connecting);

            let attempt = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = tokio::time::timeout(
                    self.retry.connect_timeout,
                    self.transport.connect(&self.client_id),
                ) => result,
            };
            let connected = attempt.unwrap_or_else(|_| {
                Err(BrokerError::Connect(format!(
                    "timed out after {:?}",
                    self.retry.connect_timeout
                )))
            });
            let mut session = match connected {
                Ok(session) => session,
                Err(e) => {
                    if self.fail_and_wait(&e, &cancel).await {
                        continue;
                    }
                    break;
                }
            };
            self.set_state(ConnectionState::Connected);

            let subscribed = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = tokio::time::timeout(
                    self.retry.connect_timeout,
                    session.subscribe(&self.topic),
                ) => Some(result),
            };
            let Some(subscribed) = subscribed else {
                self.disconnect(session).await;
                break;
            };
            let subscribed = subscribed.unwrap_or_else(|_| {
                Err(BrokerError::Subscribe(format!(
                    "no acknowledgement after {:?}",
                    self.retry.connect_timeout
                )))
            });
            if let Err(e) = subscribed {
                drop(session);
                if self.fail_and_wait(&e, &cancel).await {
                    continue;
                }
                break;
            }

            self.set_state(ConnectionState::Subscribed);
            info!(client_id = %self.client_id, topic = %self.topic, "subscribed");

            match self.serve(&mut session, &cancel).await {
                ServeExit::Cancelled => {
                    self.disconnect(session).await;
                    break;
                }
                ServeExit::Lost => {
                    drop(session);
                    warn!(client_id = %self.client_id, "broker connection lost, reconnecting");
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(client_id = %self.client_id, "connection manager shutting down");
    }

    /// Record a connect or subscribe failure, then wait out the backoff.
    /// Returns `false` if cancelled while waiting.
    async fn fail_and_wait(&self, error: &BrokerError, cancel: &CancellationToken) -> bool {
        self.set_state(ConnectionState::Failed);
        warn!(
            client_id = %self.client_id,
            error = %error,
            retry_in = ?self.retry.backoff,
            "broker connection failed"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(self.retry.backoff) => true,
        }
    }

    async fn serve(&self, session: &mut T::Session, cancel: &CancellationToken) -> ServeExit {
        let period = self.retry.liveness_interval.max(Duration::from_millis(1));
        let mut liveness = tokio::time::interval(period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick one period from now, not immediately.
        liveness.reset();

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => ServeEvent::Cancelled,
                _ = liveness.tick() => ServeEvent::LivenessCheck,
                inbound = session.next_inbound() => ServeEvent::Inbound(inbound),
            };

            match event {
                ServeEvent::Cancelled => return ServeExit::Cancelled,
                ServeEvent::LivenessCheck => {
                    if !session.is_alive() {
                        return ServeExit::Lost;
                    }
                    trace!(client_id = %self.client_id, "liveness check passed");
                }
                ServeEvent::Inbound(Ok(message)) => {
                    self.handler.on_message(&message.topic, &message.payload).await;
                }
                ServeEvent::Inbound(Err(e)) => {
                    warn!(client_id = %self.client_id, error = %e, "broker session error");
                    return ServeExit::Lost;
                }
            }
        }
    }

    async fn disconnect(&self, session: T::Session) {
        match tokio::time::timeout(self.retry.disconnect_timeout, session.disconnect()).await {
            Ok(Ok(())) => debug!(client_id = %self.client_id, "disconnected from broker"),
            Ok(Err(e)) => warn!(client_id = %self.client_id, error = %e, "disconnect failed"),
            Err(_) => warn!(client_id = %self.client_id, "disconnect timed out"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::memory::{MemoryBroker, MemoryTransport};

    /// Call counts shared by a scripted transport and its sessions.
    #[derive(Debug, Default)]
    struct Script {
        connects: AtomicUsize,
        subscribes: AtomicUsize,
        disconnects: AtomicUsize,
    }

    /// Connects every time, refuses the first subscription, and never
    /// finishes a disconnect.
    struct ScriptedTransport {
        script: Arc<Script>,
    }

    struct ScriptedSession {
        script: Arc<Script>,
    }

    impl BrokerTransport for ScriptedTransport {
        type Session = ScriptedSession;

        async fn connect(&mut self, _client_id: &str) -> Result<ScriptedSession, BrokerError> {
            self.script.connects.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedSession {
                script: Arc::clone(&self.script),
            })
        }
    }

    impl BrokerSession for ScriptedSession {
        async fn subscribe(&mut self, _topic: &str) -> Result<(), BrokerError> {
            if self.script.subscribes.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(BrokerError::Subscribe(String::from("nack")));
            }
            Ok(())
        }

        async fn next_inbound(&mut self) -> Result<InboundMessage, BrokerError> {
            std::future::pending().await
        }

        fn is_alive(&self) -> bool {
            true
        }

        async fn disconnect(self) -> Result<(), BrokerError> {
            self.script.disconnects.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[derive(Debug, Default)]
    struct CountingHandler {
        seen: AtomicUsize,
    }

    impl MessageHandler for CountingHandler {
        async fn on_message(&self, _topic: &str, _payload: &[u8]) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(
        broker: &MemoryBroker,
        handler: Arc<CountingHandler>,
    ) -> ConnectionManager<MemoryTransport, Arc<CountingHandler>> {
        ConnectionManager::new(
            MemoryTransport::new(broker.clone()),
            handler,
            "vehicle/coordinates",
            "backend_subscriber",
            RetryPolicy::default(),
        )
    }

    #[test]
    fn client_id_is_prefixed_and_unique() {
        let a = client_id("backend_subscriber");
        let b = client_id("backend_subscriber");
        assert!(a.starts_with("backend_subscriber_"));
        assert_ne!(a, b);
    }

    #[test]
    fn default_policy_waits_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff, Duration::from_secs(5));
        assert_eq!(policy.liveness_interval, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribed_messages_reach_the_handler() {
        let broker = MemoryBroker::new();
        let handler = Arc::new(CountingHandler::default());
        let manager = manager(&broker, Arc::clone(&handler));
        let mut state = manager.state();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(manager.run(cancel.clone()));

        state
            .wait_for(|s| *s == ConnectionState::Subscribed)
            .await
            .unwrap();
        for _ in 0..3 {
            broker.publish("vehicle/coordinates", b"{}".to_vec()).unwrap();
        }
        broker.publish("elsewhere", b"{}".to_vec()).unwrap();

        while handler.seen.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(handler.seen.load(Ordering::SeqCst), 3);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
        assert_eq!(broker.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_stops_promptly() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);
        let manager = manager(&broker, Arc::new(CountingHandler::default()));
        let mut state = manager.state();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(manager.run(cancel.clone()));

        state
            .wait_for(|s| *s == ConnectionState::Failed)
            .await
            .unwrap();
        let cancelled_at = Instant::now();
        cancel.cancel();
        task.await.unwrap();

        assert!(cancelled_at.elapsed() < Duration::from_secs(1));
        assert_eq!(broker.connect_attempts(), 1);
        assert_eq!(broker.disconnects(), 0);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_manager_never_connects() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker, Arc::new(CountingHandler::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        manager.run(cancel).await;
        assert_eq!(broker.connect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_subscription_backs_off_and_retries() {
        let script = Arc::new(Script::default());
        let policy = RetryPolicy::default();
        let manager = ConnectionManager::new(
            ScriptedTransport {
                script: Arc::clone(&script),
            },
            Arc::new(CountingHandler::default()),
            "vehicle/coordinates",
            "backend_subscriber",
            policy,
        );
        let mut state = manager.state();
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let task = tokio::spawn(manager.run(cancel.clone()));

        state
            .wait_for(|s| *s == ConnectionState::Failed)
            .await
            .unwrap();
        assert_eq!(script.connects.load(Ordering::SeqCst), 1);

        state
            .wait_for(|s| *s == ConnectionState::Subscribed)
            .await
            .unwrap();
        assert!(started.elapsed() >= policy.backoff);
        assert!(started.elapsed() < policy.backoff + Duration::from_secs(1));
        assert_eq!(script.connects.load(Ordering::SeqCst), 2);
        assert_eq!(script.subscribes.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(script.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_disconnect_is_abandoned_after_timeout() {
        let script = Arc::new(Script::default());
        // The first subscription is refused; skip past it.
        script.subscribes.store(1, Ordering::SeqCst);
        let policy = RetryPolicy::default();
        let manager = ConnectionManager::new(
            ScriptedTransport {
                script: Arc::clone(&script),
            },
            Arc::new(CountingHandler::default()),
            "vehicle/coordinates",
            "backend_subscriber",
            policy,
        );
        let mut state = manager.state();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(manager.run(cancel.clone()));

        state
            .wait_for(|s| *s == ConnectionState::Subscribed)
            .await
            .unwrap();
        let cancelled_at = Instant::now();
        cancel.cancel();
        task.await.unwrap();

        assert!(cancelled_at.elapsed() >= policy.disconnect_timeout);
        assert!(cancelled_at.elapsed() < policy.disconnect_timeout + Duration::from_secs(1));
        assert_eq!(script.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }
}
