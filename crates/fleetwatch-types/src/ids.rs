//! Type-safe vehicle identifier.
//!
//! Vehicle ids are small integers assigned when the fleet is seeded and
//! never change afterwards. The newtype keeps them from being mixed up
//! with timestamps or list indices.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Unique identifier of a vehicle in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VehicleId(pub u32);

impl VehicleId {
    /// Create an identifier from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Return the raw integer value.
    pub const fn into_inner(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VehicleId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<VehicleId> for u32 {
    fn from(id: VehicleId) -> Self {
        id.0
    }
}
