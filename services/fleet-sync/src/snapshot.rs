//! Read-only fleet snapshots
//!
//! A snapshot is an `Arc` to one immutable version of the fleet map. Taking
//! one never copies trajectories, and merges that happen afterwards never
//! show up in it. Checksums are deterministic over ids and coordinates so
//! two stores fed the same updates produce the same checksum.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_types::ids::EntityId;
use fleet_types::position::Trajectory;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Mapping from entity to trajectory, iterated in id order.
pub type FleetState = BTreeMap<EntityId, Trajectory>;

/// A versioned, immutable view of the fleet.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    /// Store version this view was taken at (number of merges so far).
    version: u64,
    /// Wall-clock time the view was taken.
    taken_at: DateTime<Utc>,
    #[serde(rename = "entities")]
    fleet: Arc<FleetState>,
}

impl FleetSnapshot {
    pub(crate) fn new(version: u64, fleet: Arc<FleetState>) -> Self {
        Self {
            version,
            taken_at: Utc::now(),
            fleet,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Look up one entity.
    pub fn get(&self, entity_id: &str) -> Option<&Trajectory> {
        self.fleet.get(entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.fleet.contains_key(entity_id)
    }

    /// Entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Trajectory)> {
        self.fleet.iter()
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.fleet.keys()
    }

    pub fn entity_count(&self) -> usize {
        self.fleet.len()
    }

    /// Total number of history points across all entities.
    pub fn point_count(&self) -> usize {
        self.fleet.values().map(Trajectory::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fleet.is_empty()
    }

    /// Borrow the underlying map.
    pub fn state(&self) -> &FleetState {
        &self.fleet
    }

    /// Owned copy of the map. Histories stay shared until written.
    pub fn to_state(&self) -> FleetState {
        (*self.fleet).clone()
    }

    /// SHA-256 over every id and position, in id order.
    pub fn checksum(&self) -> String {
        compute_checksum(&self.fleet)
    }
}

/// Compute a SHA-256 checksum over the fleet map.
///
/// Coordinates are hashed by bit pattern so the result does not depend on
/// float formatting.
pub fn compute_checksum(fleet: &FleetState) -> String {
    let mut hasher = Sha256::new();

    for (entity_id, trajectory) in fleet {
        hasher.update(entity_id.as_str().as_bytes());
        hasher.update(b":");
        for position in trajectory.history() {
            hasher.update(position.latitude.to_bits().to_le_bytes());
            hasher.update(position.longitude.to_bits().to_le_bytes());
        }
        hasher.update(b"|");
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::position::Position;

    fn fleet() -> FleetState {
        let mut a = Trajectory::start(Position::new(1.0, 1.0));
        a.push(Position::new(2.0, 2.0));
        let b = Trajectory::start(Position::new(9.0, 9.0));

        let mut fleet = FleetState::new();
        fleet.insert(EntityId::new("B"), b);
        fleet.insert(EntityId::new("A"), a);
        fleet
    }

    #[test]
    fn test_snapshot_accessors() {
        let snap = FleetSnapshot::new(3, Arc::new(fleet()));

        assert_eq!(snap.version(), 3);
        assert_eq!(snap.entity_count(), 2);
        assert_eq!(snap.point_count(), 3);
        assert!(snap.contains("A"));
        assert!(!snap.contains("C"));
        assert_eq!(snap.get("A").unwrap().current(), Position::new(2.0, 2.0));
    }

    #[test]
    fn test_iteration_in_id_order() {
        let snap = FleetSnapshot::new(3, Arc::new(fleet()));
        let ids: Vec<&str> = snap.entity_ids().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_deterministic_checksum() {
        let s1 = FleetSnapshot::new(3, Arc::new(fleet()));
        let s2 = FleetSnapshot::new(7, Arc::new(fleet()));
        assert_eq!(s1.checksum(), s2.checksum());
    }

    #[test]
    fn test_checksum_changes_with_history() {
        let before = compute_checksum(&fleet());

        let mut changed = fleet();
        if let Some(t) = changed.get_mut("B") {
            t.push(Position::new(9.5, 9.5));
        }

        assert_ne!(before, compute_checksum(&changed));
    }

    #[test]
    fn test_snapshot_serialization_shape() {
        let snap = FleetSnapshot::new(3, Arc::new(fleet()));
        let json = serde_json::to_value(&snap).unwrap();

        assert_eq!(json["version"], 3);
        assert!(json["taken_at"].is_string());
        assert_eq!(json["entities"]["A"]["history"].as_array().unwrap().len(), 2);
        assert_eq!(json["entities"]["B"]["current"]["latitude"], 9.0);
    }
}
