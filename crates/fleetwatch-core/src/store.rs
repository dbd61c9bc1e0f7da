//! In-memory vehicle state store.
//!
//! [`VehicleStore`] is the single owner of every vehicle's position. The
//! telemetry subscriber writes through [`VehicleStore::set`]; the query
//! API reads through the listing methods. Everything handed out is a
//! clone, so callers can never mutate the canonical state.
//!
//! The fleet is fixed at construction (seeded), kept in seed order, and
//! guarded by a single [`RwLock`]. A position update is one whole-value
//! replacement under the write lock, so two concurrent updates to the same
//! vehicle can never interleave.

use std::collections::BTreeSet;
use std::sync::Arc;

use fleetwatch_types::{CoordinateSnapshot, Position, Vehicle, VehicleId};
use tokio::sync::RwLock;

/// Errors returned by the vehicle store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No vehicle with this id exists in the fleet.
    #[error("vehicle {0} not found")]
    NotFound(VehicleId),

    /// Two seed records share an id.
    #[error("duplicate vehicle id {0} in fleet")]
    DuplicateId(VehicleId),
}

/// Shared handle to the fleet's canonical state.
///
/// Cloning the handle is cheap and every clone sees the same vehicles.
#[derive(Debug, Clone)]
pub struct VehicleStore {
    vehicles: Arc<RwLock<Vec<Vehicle>>>,
}

impl VehicleStore {
    /// Create a store from a fixed fleet, keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if two vehicles share an id.
    pub fn new(vehicles: Vec<Vehicle>) -> Result<Self, StoreError> {
        let mut seen = BTreeSet::new();
        for vehicle in &vehicles {
            if !seen.insert(vehicle.id) {
                return Err(StoreError::DuplicateId(vehicle.id));
            }
        }
        Ok(Self {
            vehicles: Arc::new(RwLock::new(vehicles)),
        })
    }

    /// Current position of a vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub async fn get(&self, id: VehicleId) -> Result<Position, StoreError> {
        let vehicles = self.vehicles.read().await;
        vehicles
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.position)
            .ok_or(StoreError::NotFound(id))
    }

    /// Replace a vehicle's position and return a snapshot of the updated
    /// vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id; the store is left
    /// untouched.
    pub async fn set(&self, id: VehicleId, position: Position) -> Result<Vehicle, StoreError> {
        let mut vehicles = self.vehicles.write().await;
        let vehicle = vehicles
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(StoreError::NotFound(id))?;
        vehicle.position = position;
        Ok(vehicle.clone())
    }

    /// Snapshot of one vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub async fn find(&self, id: VehicleId) -> Result<Vehicle, StoreError> {
        let vehicles = self.vehicles.read().await;
        vehicles
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Snapshot of the whole fleet in seed order.
    pub async fn list_all(&self) -> Vec<Vehicle> {
        self.vehicles.read().await.clone()
    }

    /// Flattened coordinates of the whole fleet in seed order.
    pub async fn coordinates(&self) -> Vec<CoordinateSnapshot> {
        self.vehicles
            .read()
            .await
            .iter()
            .map(CoordinateSnapshot::from)
            .collect()
    }

    /// Vehicle ids in seed order.
    pub async fn ids(&self) -> Vec<VehicleId> {
        self.vehicles.read().await.iter().map(|v| v.id).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fleet() -> Vec<Vehicle> {
        vec![
            Vehicle::new(VehicleId::new(1), "ABC-123", "Toyota", "Corolla"),
            Vehicle::new(VehicleId::new(2), "XYZ-789", "Honda", "Civic"),
            Vehicle::new(VehicleId::new(3), "DEF-456", "Ford", "Focus"),
        ]
    }

    #[tokio::test]
    async fn set_then_get_returns_the_new_position() {
        let store = VehicleStore::new(fleet()).unwrap();
        let position = Position::new(34.05, -118.25, 1_700_000_000);

        let updated = store.set(VehicleId::new(2), position).await.unwrap();
        assert_eq!(updated.registration, "XYZ-789");
        assert_eq!(store.get(VehicleId::new(2)).await.unwrap(), position);
        assert_eq!(
            store.get(VehicleId::new(1)).await.unwrap(),
            Position::UNINITIALIZED
        );
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = VehicleStore::new(fleet()).unwrap();
        let missing = VehicleId::new(99);

        assert_eq!(store.get(missing).await, Err(StoreError::NotFound(missing)));
        assert_eq!(
            store.set(missing, Position::new(1.0, 1.0, 1)).await,
            Err(StoreError::NotFound(missing))
        );
        assert_eq!(store.find(missing).await, Err(StoreError::NotFound(missing)));
    }

    #[tokio::test]
    async fn listing_keeps_seed_order() {
        let store = VehicleStore::new(fleet()).unwrap();
        let ids: Vec<u32> = store.ids().await.into_iter().map(u32::from).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let all = store.list_all().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all.first().unwrap().registration, "ABC-123");

        let coords = store.coordinates().await;
        assert_eq!(coords.get(2).unwrap().registration, "DEF-456");
    }

    #[tokio::test]
    async fn snapshots_are_detached_from_the_store() {
        let store = VehicleStore::new(fleet()).unwrap();
        let mut snapshot = store.find(VehicleId::new(1)).await.unwrap();
        snapshot.position = Position::new(9.0, 9.0, 9);

        assert_eq!(
            store.get(VehicleId::new(1)).await.unwrap(),
            Position::UNINITIALIZED
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut vehicles = fleet();
        vehicles.push(Vehicle::new(VehicleId::new(2), "DUP-000", "Kia", "Rio"));
        assert_eq!(
            VehicleStore::new(vehicles).unwrap_err(),
            StoreError::DuplicateId(VehicleId::new(2))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sets_never_mix_positions() {
        let store = VehicleStore::new(fleet()).unwrap();
        let id = VehicleId::new(1);
        let first = Position::new(10.0, 20.0, 100);
        let second = Position::new(-30.0, -40.0, 200);

        for _ in 0..200 {
            let a = {
                let store = store.clone();
                tokio::spawn(async move { store.set(id, first).await })
            };
            let b = {
                let store = store.clone();
                tokio::spawn(async move { store.set(id, second).await })
            };
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            let stored = store.get(id).await.unwrap();
            assert!(stored == first || stored == second, "mixed value {stored:?}");
        }
    }
}
