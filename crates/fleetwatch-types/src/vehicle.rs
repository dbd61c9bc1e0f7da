//! Vehicle identity records and their last-known position.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::VehicleId;

/// A single position fix reported for a vehicle.
///
/// Positions are plain values: an update replaces the whole value, never
/// one coordinate at a time. A position at exactly `(0, 0)` is the
/// "never initialized" sentinel, see [`Position::is_initialized`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Latitude in degrees, nominally within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, nominally within `[-180, 180]`.
    pub longitude: f64,
    /// Seconds since the Unix epoch. `0` means the vehicle was never updated.
    #[ts(type = "number")]
    pub timestamp: u64,
}

impl Position {
    /// The uninitialized sentinel position.
    pub const UNINITIALIZED: Self = Self {
        latitude: 0.0,
        longitude: 0.0,
        timestamp: 0,
    };

    /// Create a position from its parts.
    pub const fn new(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Whether this position carries a real reading.
    ///
    /// Exactly `(0, 0)` is reserved as the uninitialized marker. This is a
    /// compatibility convention with existing consumers, not a geographic
    /// check: a reading a hair away from the origin still counts as real.
    #[allow(clippy::float_cmp)]
    pub fn is_initialized(&self) -> bool {
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

/// A tracked vehicle and the last position the relay saw for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vehicle {
    /// Immutable identifier assigned at seed time.
    pub id: VehicleId,
    /// Registration plate (e.g. `ABC-123`).
    pub registration: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Last-known position.
    pub position: Position,
}

impl Vehicle {
    /// Create a vehicle with an uninitialized position.
    pub fn new(
        id: VehicleId,
        registration: impl Into<String>,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id,
            registration: registration.into(),
            manufacturer: manufacturer.into(),
            model: model.into(),
            position: Position::UNINITIALIZED,
        }
    }

    /// Builder-style helper to set the starting position.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}
