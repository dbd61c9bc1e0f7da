//! Error types for the simulator.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleetwatch_broker::BrokerError;
use fleetwatch_core::ConfigError;

/// Errors surfaced by the simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// Publishing to the broker failed.
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The control server failed to bind or serve.
    #[error("server error: {0}")]
    Server(String),
}

impl IntoResponse for SimulatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Broker(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
