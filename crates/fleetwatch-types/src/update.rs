//! Flattened vehicle records pushed to live-view clients and served by
//! the coordinates query.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::VehicleId;
use crate::vehicle::{Position, Vehicle};

/// A position update broadcast to every connected live-view client.
///
/// Carries copies of the stored values; receivers never see the store
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VehicleUpdate {
    /// The vehicle that moved.
    pub id: VehicleId,
    /// Its registration plate.
    pub registration: String,
    /// New latitude.
    pub latitude: f64,
    /// New longitude.
    pub longitude: f64,
    /// Timestamp of the fix (Unix seconds).
    #[ts(type = "number")]
    pub timestamp: u64,
}

impl VehicleUpdate {
    /// Build an update from a vehicle snapshot.
    pub fn from_vehicle(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id,
            registration: vehicle.registration.clone(),
            latitude: vehicle.position.latitude,
            longitude: vehicle.position.longitude,
            timestamp: vehicle.position.timestamp,
        }
    }

    /// The position carried by this update.
    pub const fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude, self.timestamp)
    }
}

/// One row of the `GET /api/vehicles/coordinates` listing.
///
/// Same shape as [`VehicleUpdate`]; kept as its own type because the
/// query surface and the live channel evolve independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CoordinateSnapshot {
    /// Vehicle identifier.
    pub id: VehicleId,
    /// Registration plate.
    pub registration: String,
    /// Last-known latitude.
    pub latitude: f64,
    /// Last-known longitude.
    pub longitude: f64,
    /// Timestamp of the last fix (Unix seconds, `0` if never updated).
    #[ts(type = "number")]
    pub timestamp: u64,
}

impl From<&Vehicle> for CoordinateSnapshot {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id,
            registration: vehicle.registration.clone(),
            latitude: vehicle.position.latitude,
            longitude: vehicle.position.longitude,
            timestamp: vehicle.position.timestamp,
        }
    }
}
