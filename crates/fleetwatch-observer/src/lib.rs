//! Query and live-view server for the Fleetwatch relay.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** for reading the fleet (`/api/vehicles`,
//!   `/api/vehicles/{id}`, `/api/vehicles/coordinates`)
//! - **`WebSocket` endpoint** (`/ws/vehicles`) streaming every
//!   [`VehicleUpdate`](fleetwatch_types::VehicleUpdate) the relay
//!   broadcasts
//!
//! # Architecture
//!
//! REST reads go straight to the shared
//! [`VehicleStore`](fleetwatch_core::VehicleStore) and only ever see
//! snapshots. Each `WebSocket` client drains its own broadcast receiver,
//! so a slow client lags on its own without holding up the relay.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
