//! Shared type definitions for the Fleetwatch telemetry relay.
//!
//! Every crate in the workspace depends on these types: the relay stores
//! [`Vehicle`] records, the codec produces [`Position`] values, and the
//! live-view channel carries [`VehicleUpdate`] messages. Types that cross
//! the HTTP / `WebSocket` boundary derive [`ts_rs::TS`] so the map client
//! can consume generated TypeScript bindings.

pub mod ids;
pub mod update;
pub mod vehicle;

pub use ids::VehicleId;
pub use update::{CoordinateSnapshot, VehicleUpdate};
pub use vehicle::{Position, Vehicle};
