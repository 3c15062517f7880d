//! State subscriber interface
//!
//! The read side handed to the rendering layer. It can take snapshots and
//! wait for the store to move on; it has no way to mutate anything.

use std::sync::Arc;

use tokio::sync::watch;

use crate::snapshot::FleetSnapshot;
use crate::store::TrajectoryStore;

/// Read-only handle onto a [`TrajectoryStore`].
#[derive(Clone)]
pub struct StateSubscriber {
    store: Arc<TrajectoryStore>,
    changes: watch::Receiver<u64>,
}

impl StateSubscriber {
    pub fn new(store: Arc<TrajectoryStore>) -> Self {
        let changes = store.changes();
        Self { store, changes }
    }

    /// Consistent view of the fleet as of this call.
    pub fn current_state(&self) -> FleetSnapshot {
        self.store.snapshot()
    }

    /// Wait until the store version moves past the last one this handle saw,
    /// then return the new version.
    pub async fn changed(&mut self) -> u64 {
        // The sender lives in the store, which this handle keeps alive.
        let _ = self.changes.changed().await;
        *self.changes.borrow_and_update()
    }

    /// Latest published store version.
    pub fn version(&self) -> u64 {
        *self.changes.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use fleet_types::ids::EntityId;
    use fleet_types::position::Position;

    #[test]
    fn test_current_state_reflects_merges() {
        let store = Arc::new(TrajectoryStore::new());
        let subscriber = StateSubscriber::new(Arc::clone(&store));
        assert!(subscriber.current_state().is_empty());

        store.merge(EntityId::new("T1"), Position::new(1.0, 2.0));
        let snap = subscriber.current_state();
        assert_eq!(snap.entity_count(), 1);
        assert_eq!(snap.version(), 1);
        assert_eq!(subscriber.version(), 1);
    }

    #[tokio::test]
    async fn test_changed_wakes_on_merge() {
        let store = Arc::new(TrajectoryStore::new());
        let mut subscriber = StateSubscriber::new(Arc::clone(&store));

        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            writer.merge(EntityId::new("T1"), Position::new(0.0, 0.0));
        });

        let version = tokio::time::timeout(Duration::from_secs(5), subscriber.changed())
            .await
            .unwrap();
        assert_eq!(version, 1);
        assert!(subscriber.current_state().contains("T1"));
    }

    #[tokio::test]
    async fn test_changed_returns_immediately_for_unseen_version() {
        let store = Arc::new(TrajectoryStore::new());
        let mut subscriber = StateSubscriber::new(Arc::clone(&store));

        store.merge(EntityId::new("T1"), Position::new(0.0, 0.0));
        store.merge(EntityId::new("T1"), Position::new(1.0, 1.0));

        let version = tokio::time::timeout(Duration::from_secs(1), subscriber.changed())
            .await
            .unwrap();
        assert_eq!(version, 2);
    }
}
