//! Axum router construction for the query server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for browser map clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /ws/vehicles` -- `WebSocket` live-view stream
/// - `GET /api/vehicles` -- list vehicles
/// - `GET /api/vehicles/{id}` -- single vehicle
/// - `GET /api/vehicles/coordinates` -- flattened positions
///
/// CORS allows any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/vehicles", get(ws::ws_vehicles))
        .route("/api/vehicles", get(handlers::list_vehicles))
        .route("/api/vehicles/coordinates", get(handlers::list_coordinates))
        .route("/api/vehicles/{id}", get(handlers::get_vehicle))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
