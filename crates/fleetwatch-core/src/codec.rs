//! Wire format for position fixes published on the broker topic.
//!
//! Payloads are UTF-8 JSON objects with PascalCase keys, which is what the
//! existing simulators emit:
//!
//! ```json
//! {"Latitude":34.05,"Longitude":-118.25,"Timestamp":1700000000}
//! ```
//!
//! Lower-case keys are accepted as aliases. An optional `VehicleId` field
//! names the vehicle the fix belongs to; only the payload-id targeting
//! policy looks at it. The simulator adds it when `simulator.vehicle_id`
//! is configured.
//!
//! The codec checks shape only. Latitude and longitude are not range
//! checked: an out-of-range reading decodes unchanged.

use fleetwatch_types::{Position, VehicleId};
use serde::Deserialize;
use serde_json::error::Category;

/// Errors produced when a payload cannot be turned into a [`Position`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not well-formed JSON (or is truncated).
    #[error("payload is not well-formed JSON: {source}")]
    Syntax {
        /// The underlying parser error.
        source: serde_json::Error,
    },

    /// The payload is JSON but not a position object: a required numeric
    /// field is missing or has the wrong type.
    #[error("payload has the wrong shape: {source}")]
    Shape {
        /// The underlying deserialization error.
        source: serde_json::Error,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(source: serde_json::Error) -> Self {
        match source.classify() {
            Category::Data => Self::Shape { source },
            Category::Syntax | Category::Eof | Category::Io => Self::Syntax { source },
        }
    }
}

/// A decoded telemetry message: the position plus the optional vehicle id
/// the publisher attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryMessage {
    /// The reported position.
    pub position: Position,
    /// Vehicle the publisher says this fix belongs to, if any.
    pub vehicle_id: Option<VehicleId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMessage {
    #[serde(alias = "latitude")]
    latitude: f64,
    #[serde(alias = "longitude")]
    longitude: f64,
    #[serde(alias = "timestamp")]
    timestamp: u64,
    #[serde(default, alias = "vehicleId", alias = "vehicle_id")]
    vehicle_id: Option<u32>,
}

/// Encode a position as a wire payload.
pub fn encode(position: &Position) -> Vec<u8> {
    serde_json::json!({
        "Latitude": position.latitude,
        "Longitude": position.longitude,
        "Timestamp": position.timestamp,
    })
    .to_string()
    .into_bytes()
}

/// Encode a position tagged with the vehicle it belongs to.
pub fn encode_for_vehicle(position: &Position, vehicle_id: VehicleId) -> Vec<u8> {
    serde_json::json!({
        "VehicleId": vehicle_id.into_inner(),
        "Latitude": position.latitude,
        "Longitude": position.longitude,
        "Timestamp": position.timestamp,
    })
    .to_string()
    .into_bytes()
}

/// Decode a wire payload into a [`Position`].
///
/// # Errors
///
/// Returns [`DecodeError::Syntax`] for malformed or truncated JSON and
/// [`DecodeError::Shape`] when a required field is missing or mistyped.
pub fn decode(payload: &[u8]) -> Result<Position, DecodeError> {
    decode_message(payload).map(|message| message.position)
}

/// Decode a wire payload, keeping the optional vehicle id.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_message(payload: &[u8]) -> Result<TelemetryMessage, DecodeError> {
    let wire: WireMessage = serde_json::from_slice(payload)?;
    Ok(TelemetryMessage {
        position: Position::new(wire.latitude, wire.longitude, wire.timestamp),
        vehicle_id: wire.vehicle_id.map(VehicleId::new),
    })
}
