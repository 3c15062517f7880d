//! Message ingestion for the Fleet Sync service
//!
//! Runs one payload through decode → resolve → merge. Called by the
//! connection manager's processing loop, one message at a time, so a
//! message is fully merged before the next is looked at.
//!
//! Rejected payloads are logged and counted; they never touch the store.

use std::sync::Arc;
use std::time::Instant;

use fleet_types::errors::DecodeError;
use fleet_types::ids::EntityId;
use fleet_types::position::Position;
use tracing::{debug, warn};

use crate::decoder::decode;
use crate::metrics::SyncMetrics;
use crate::resolver::resolve;
use crate::store::TrajectoryStore;

/// Result of merging one accepted payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub entity_id: EntityId,
    pub position: Position,
    /// History length after the merge.
    pub history_len: usize,
}

/// Feeds decoded updates into the trajectory store.
pub struct StreamIngester {
    store: Arc<TrajectoryStore>,
    metrics: Arc<SyncMetrics>,
    /// Total payloads merged by this ingester.
    updates_accepted: u64,
    /// Total payloads rejected by the decoder.
    updates_dropped: u64,
}

impl StreamIngester {
    pub fn new(store: Arc<TrajectoryStore>, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            store,
            metrics,
            updates_accepted: 0,
            updates_dropped: 0,
        }
    }

    /// Ingest a single payload.
    ///
    /// On `Err` the payload has been dropped and the store is unchanged.
    pub fn ingest(&mut self, payload: &[u8]) -> Result<Merged, DecodeError> {
        let start = Instant::now();
        self.metrics.record_message_received();

        let update = match decode(payload) {
            Ok(update) => update,
            Err(err) => {
                self.updates_dropped += 1;
                self.metrics.record_decode_error(&err);
                warn!(
                    error = %err,
                    kind = err.kind(),
                    payload_len = payload.len(),
                    "Dropping undecodable message"
                );
                return Err(err);
            }
        };

        let entity_id = resolve(&update);
        let position = update.position();
        let trajectory = self.store.merge(entity_id.clone(), position);

        self.updates_accepted += 1;
        self.metrics
            .record_merge(start.elapsed().as_nanos().min(u64::MAX as u128) as u64);

        debug!(
            entity_id = %entity_id,
            position = %position,
            history_len = trajectory.len(),
            "Position merged"
        );

        Ok(Merged {
            entity_id,
            position,
            history_len: trajectory.len(),
        })
    }

    /// Total payloads merged since creation.
    pub fn updates_accepted(&self) -> u64 {
        self.updates_accepted
    }

    /// Total payloads dropped since creation.
    pub fn updates_dropped(&self) -> u64 {
        self.updates_dropped
    }

    pub fn store(&self) -> &Arc<TrajectoryStore> {
        &self.store
    }
}
