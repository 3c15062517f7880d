//! Trajectory store
//!
//! Owns the fleet map and is its only mutator. The map lives behind an
//! `Arc`; `snapshot` clones the `Arc` and `merge` goes through
//! `Arc::make_mut`, so a snapshot taken before a merge is never altered by it.
//! Every merge bumps the version and publishes it on a `watch` channel.

use std::collections::btree_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use fleet_types::ids::EntityId;
use fleet_types::position::{Position, Trajectory};
use tokio::sync::watch;

use crate::snapshot::{FleetSnapshot, FleetState};

struct VersionedFleet {
    version: u64,
    fleet: Arc<FleetState>,
}

/// Per-entity ordered position history.
pub struct TrajectoryStore {
    state: RwLock<VersionedFleet>,
    changes: watch::Sender<u64>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: RwLock::new(VersionedFleet {
                version: 0,
                fleet: Arc::new(FleetState::new()),
            }),
            changes,
        }
    }

    /// Append `position` to the entity's history and make it current.
    ///
    /// Creates the entity on first sight. Returns the updated trajectory.
    pub fn merge(&self, entity_id: EntityId, position: Position) -> Trajectory {
        let (trajectory, version) = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let fleet = Arc::make_mut(&mut guard.fleet);

            let trajectory = match fleet.entry(entity_id) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().push(position);
                    entry.get().clone()
                }
                Entry::Vacant(entry) => entry.insert(Trajectory::start(position)).clone(),
            };

            guard.version += 1;
            (trajectory, guard.version)
        };

        self.changes.send_replace(version);
        trajectory
    }

    /// Consistent read-only view as of this call.
    pub fn snapshot(&self) -> FleetSnapshot {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        FleetSnapshot::new(guard.version, Arc::clone(&guard.fleet))
    }

    /// Number of merges applied so far.
    pub fn version(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    pub fn entity_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fleet
            .len()
    }

    /// Receiver that observes the version after every merge.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

impl Default for TrajectoryStore {
    fn default() -> Self {
        Self::new()
    }
}
