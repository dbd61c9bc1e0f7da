//! Policies deciding which vehicle a telemetry message updates.
//!
//! The legacy relay always overwrote the first vehicle of the fleet,
//! whatever the message was about. That behavior is kept as
//! [`FirstVehicle`] and stays the default so existing publishers (which do
//! not tag their payloads) keep working. [`PayloadVehicleId`] matches the
//! optional `VehicleId` payload field against the fleet instead.
//!
//! The policy is picked once at startup from `relay.targeting`.

use std::fmt::Debug;
use std::sync::Arc;

use fleetwatch_types::VehicleId;
use serde::Deserialize;

use crate::codec::TelemetryMessage;

/// Which targeting policy the relay uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingMode {
    /// Always update the first vehicle in fleet order.
    #[default]
    First,
    /// Update the vehicle named by the payload's `VehicleId` field.
    PayloadId,
}

/// Resolves the vehicle a decoded message applies to.
pub trait TargetingPolicy: Send + Sync + Debug {
    /// Pick the target among `fleet` (ids in fleet order), or `None` if the
    /// message cannot be attributed to any known vehicle.
    fn resolve(&self, message: &TelemetryMessage, fleet: &[VehicleId]) -> Option<VehicleId>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Legacy policy: the first vehicle of the fleet gets every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstVehicle;

impl TargetingPolicy for FirstVehicle {
    fn resolve(&self, _message: &TelemetryMessage, fleet: &[VehicleId]) -> Option<VehicleId> {
        fleet.first().copied()
    }

    fn name(&self) -> &'static str {
        "first"
    }
}

/// Match the payload's vehicle id against the fleet. Untagged messages
/// resolve to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadVehicleId;

impl TargetingPolicy for PayloadVehicleId {
    fn resolve(&self, message: &TelemetryMessage, fleet: &[VehicleId]) -> Option<VehicleId> {
        let wanted = message.vehicle_id?;
        fleet.iter().copied().find(|id| *id == wanted)
    }

    fn name(&self) -> &'static str {
        "payload_id"
    }
}

/// Build the policy for a configured mode.
pub fn policy_for(mode: TargetingMode) -> Arc<dyn TargetingPolicy> {
    match mode {
        TargetingMode::First => Arc::new(FirstVehicle),
        TargetingMode::PayloadId => Arc::new(PayloadVehicleId),
    }
}
