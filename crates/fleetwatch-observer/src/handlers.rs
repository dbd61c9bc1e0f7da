//! REST handlers for the vehicle query API.
//!
//! All handlers read from the shared [`VehicleStore`] and return JSON.
//!
//! [`VehicleStore`]: fleetwatch_core::VehicleStore

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use fleetwatch_types::{CoordinateSnapshot, Vehicle, VehicleId};
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/vehicles -- list vehicles
// ---------------------------------------------------------------------------

/// List every vehicle in seed order, positions included.
///
/// Vehicles still at the `(0, 0)` sentinel are listed as-is and noted in
/// the log.
pub async fn list_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<Vehicle>> {
    let vehicles = state.store.list_all().await;
    for vehicle in vehicles.iter().filter(|v| !v.position.is_initialized()) {
        info!(
            vehicle_id = %vehicle.id,
            registration = %vehicle.registration,
            "position not initialized"
        );
    }
    Json(vehicles)
}

// ---------------------------------------------------------------------------
// GET /api/vehicles/{id} -- single vehicle
// ---------------------------------------------------------------------------

/// Get one vehicle by id.
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<Json<Vehicle>, ObserverError> {
    let id = parse_vehicle_id(&id_str)?;
    let vehicle = state.store.find(id).await?;
    Ok(Json(vehicle))
}

// ---------------------------------------------------------------------------
// GET /api/vehicles/coordinates -- flattened positions
// ---------------------------------------------------------------------------

/// Id, registration and position of every vehicle, in seed order.
pub async fn list_coordinates(State(state): State<Arc<AppState>>) -> Json<Vec<CoordinateSnapshot>> {
    Json(state.store.coordinates().await)
}

fn parse_vehicle_id(raw: &str) -> Result<VehicleId, ObserverError> {
    raw.parse::<u32>()
        .map(VehicleId::new)
        .map_err(|e| ObserverError::InvalidId(format!("{raw}: {e}")))
}
