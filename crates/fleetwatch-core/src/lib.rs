//! Telemetry relay core for Fleetwatch.
//!
//! This crate holds everything the relay does between "bytes arrived on
//! the broker topic" and "live-view clients were notified":
//!
//! - [`codec`] -- JSON wire format for position fixes
//! - [`store`] -- the [`VehicleStore`], sole owner of each vehicle's position
//! - [`targeting`] -- policies deciding which vehicle a message updates
//! - [`broadcast`] -- the fire-and-forget [`Broadcaster`] fan-out
//! - [`subscriber`] -- the [`TelemetrySubscriber`] gluing the above together
//! - [`config`] -- typed `fleetwatch-config.yaml` loading
//! - [`seed`] -- the built-in demo fleet
//!
//! The broker connection itself lives in `fleetwatch-broker`; it drives a
//! [`MessageHandler`] and knows nothing about vehicles.

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod seed;
pub mod store;
pub mod subscriber;
pub mod targeting;

pub use broadcast::Broadcaster;
pub use codec::{DecodeError, TelemetryMessage};
pub use config::{ConfigError, FleetwatchConfig};
pub use store::{StoreError, VehicleStore};
pub use subscriber::{IngestError, MessageHandler, TelemetrySubscriber};
pub use targeting::{TargetingMode, TargetingPolicy};
