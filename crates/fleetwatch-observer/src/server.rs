//! Serving the query API on the relay's configured address.
//!
//! [`start_server`] is [`bind`] followed by [`serve`]; the two halves are
//! public so callers can bind early (or to port `0`) and serve later.

use std::net::SocketAddr;
use std::sync::Arc;

use fleetwatch_core::config::RelayConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Failure to bind or run the query server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `relay.host`/`relay.port` is not a usable socket address.
    #[error("cannot bind {addr}: {reason}")]
    Bind {
        /// The address as configured.
        addr: String,
        /// Why it failed.
        reason: String,
    },

    /// The accept loop failed.
    #[error("query server failed: {0}")]
    Serve(String),
}

/// Bind the listener for `relay.host:relay.port`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] for an unparsable address or a port
/// already in use.
pub async fn bind(config: &RelayConfig) -> Result<TcpListener, ServerError> {
    let raw = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = raw.parse().map_err(|e: std::net::AddrParseError| ServerError::Bind {
        addr: raw.clone(),
        reason: e.to_string(),
    })?;
    TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
        addr: raw,
        reason: e.to_string(),
    })
}

/// Serve the router on `listener` until `shutdown` fires, then let
/// in-flight requests finish.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if accepting connections fails.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "query server listening");
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    info!("query server stopped");
    Ok(())
}

/// Bind and serve until `shutdown` fires.
///
/// # Errors
///
/// See [`bind`] and [`serve`].
pub async fn start_server(
    config: &RelayConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, state, shutdown).await
}
