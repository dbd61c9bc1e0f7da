//! Built-in demo fleet.
//!
//! Used when `fleetwatch-config.yaml` does not list a `fleet`. Three cars
//! parked around downtown Los Angeles, none of them updated yet
//! (timestamp `0`).

use fleetwatch_types::{Position, Vehicle, VehicleId};
use serde::Deserialize;

/// One vehicle entry of the `fleet` configuration section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VehicleSeed {
    /// Vehicle identifier (must be unique across the fleet).
    pub id: u32,
    /// Registration plate.
    pub registration: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Starting latitude (`0` together with longitude `0` means unknown).
    #[serde(default)]
    pub latitude: f64,
    /// Starting longitude.
    #[serde(default)]
    pub longitude: f64,
    /// Starting timestamp (Unix seconds, `0` for never updated).
    #[serde(default)]
    pub timestamp: u64,
}

impl VehicleSeed {
    /// Turn the seed entry into a [`Vehicle`].
    pub fn to_vehicle(&self) -> Vehicle {
        Vehicle::new(
            VehicleId::new(self.id),
            self.registration.as_str(),
            self.manufacturer.as_str(),
            self.model.as_str(),
        )
        .with_position(Position::new(self.latitude, self.longitude, self.timestamp))
    }
}

fn seed(id: u32, registration: &str, manufacturer: &str, model: &str, lat: f64, lon: f64) -> VehicleSeed {
    VehicleSeed {
        id,
        registration: registration.to_owned(),
        manufacturer: manufacturer.to_owned(),
        model: model.to_owned(),
        latitude: lat,
        longitude: lon,
        timestamp: 0,
    }
}

/// The default fleet entries.
pub fn default_fleet() -> Vec<VehicleSeed> {
    vec![
        seed(1, "ABC-123", "Toyota", "Corolla", 34.05, -118.25),
        seed(2, "XYZ-789", "Honda", "Civic", 34.06, -118.24),
        seed(3, "DEF-456", "Ford", "Focus", 34.07, -118.23),
    ]
}

/// Build vehicles from seed entries, keeping their order.
pub fn vehicles_from(seeds: &[VehicleSeed]) -> Vec<Vehicle> {
    seeds.iter().map(VehicleSeed::to_vehicle).collect()
}
