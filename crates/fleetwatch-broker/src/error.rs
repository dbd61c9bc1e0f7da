//! Error types for broker connections.

/// Failures talking to the message broker.
///
/// `Connect` and `Subscribe` are recovered by the connection manager
/// (backoff, then retry) and never reach the host process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or refused the connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The broker rejected or never acknowledged the subscription.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// An established session dropped.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A message could not be queued for publishing.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The graceful disconnect did not complete.
    #[error("disconnect failed: {0}")]
    Disconnect(String),
}
