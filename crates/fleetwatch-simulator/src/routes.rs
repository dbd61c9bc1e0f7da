//! REST control surface for the simulator.
//!
//! - `POST /vehicle/publish` -- publish one position, echo it back
//! - `POST /vehicle/start` -- start the continuous loop (idempotent)
//! - `POST /vehicle/stop` -- stop the continuous loop

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use fleetwatch_broker::CoordinatePublisher;
use fleetwatch_types::Position;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::controller::PublishController;
use crate::error::SimulatorError;

/// Response to `POST /vehicle/publish`.
#[derive(Debug, Clone, Serialize)]
pub struct PublishAck {
    /// Human-readable outcome.
    pub message: &'static str,
    /// The position that was published.
    pub data: Position,
}

/// Response to `POST /vehicle/start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartAck {
    /// Human-readable outcome.
    pub message: &'static str,
    /// `false` if a loop was already running.
    pub started: bool,
}

/// Response to `POST /vehicle/stop`.
#[derive(Debug, Clone, Serialize)]
pub struct StopAck {
    /// Human-readable outcome.
    pub message: &'static str,
    /// `false` if no loop was running.
    pub stopped: bool,
}

/// Build the control router around a shared controller.
pub fn build_router<P>(controller: Arc<PublishController<P>>) -> Router
where
    P: CoordinatePublisher + 'static,
{
    Router::new()
        .route("/vehicle/publish", post(publish::<P>))
        .route("/vehicle/start", post(start::<P>))
        .route("/vehicle/stop", post(stop::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(controller)
}

async fn publish<P>(
    State(controller): State<Arc<PublishController<P>>>,
) -> Result<Json<PublishAck>, SimulatorError>
where
    P: CoordinatePublisher + 'static,
{
    let data = controller.publish_once().await?;
    Ok(Json(PublishAck {
        message: "Coordinates published",
        data,
    }))
}

async fn start<P>(State(controller): State<Arc<PublishController<P>>>) -> Json<StartAck>
where
    P: CoordinatePublisher + 'static,
{
    let started = controller.start_continuous().await;
    let message = if started {
        "Continuous publishing started"
    } else {
        "Continuous publishing already running"
    };
    Json(StartAck { message, started })
}

async fn stop<P>(State(controller): State<Arc<PublishController<P>>>) -> Json<StopAck>
where
    P: CoordinatePublisher + 'static,
{
    let stopped = controller.stop_continuous().await;
    let message = if stopped {
        "Continuous publishing stopped"
    } else {
        "Continuous publishing was not running"
    };
    Json(StopAck { message, stopped })
}
