//! Replay of captured payloads
//!
//! Rebuilds a fleet state from a recorded sequence of raw messages by running
//! them through the same ingestion path as the live stream. Same payloads in
//! the same order always give the same state checksum, which makes replay
//! the tool for checking determinism and diagnosing a captured session.

use std::sync::Arc;
use std::time::Instant;

use fleet_types::errors::DecodeError;
use tracing::{error, info};

use crate::ingestion::StreamIngester;
use crate::metrics::SyncMetrics;
use crate::snapshot::FleetSnapshot;
use crate::store::TrajectoryStore;

/// Metrics collected during replay.
#[derive(Debug, Clone)]
pub struct ReplayMetrics {
    /// Payloads merged into the rebuilt state.
    pub payloads_replayed: u64,
    /// Payloads the decoder rejected.
    pub payloads_dropped: u64,
    pub duration_ms: u128,
    /// Checksum of the rebuilt state.
    pub state_checksum: String,
}

/// Result of a replay operation.
#[derive(Debug)]
pub struct ReplayResult {
    pub state: FleetSnapshot,
    pub metrics: ReplayMetrics,
}

/// Errors during replay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("state checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("payload {index} could not be decoded: {source}")]
    UndecodablePayload {
        index: usize,
        #[source]
        source: DecodeError,
    },
}

/// Replays raw payloads into a fresh store.
pub struct ReplayEngine {
    expected_checksum: Option<String>,
    /// Fail on the first undecodable payload instead of dropping it.
    strict_decoding: bool,
}

impl ReplayEngine {
    pub fn new() -> Self {
        Self {
            expected_checksum: None,
            strict_decoding: false,
        }
    }

    /// Set the expected state checksum for post-replay validation.
    pub fn with_expected_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.expected_checksum = Some(checksum.into());
        self
    }

    pub fn with_strict_decoding(mut self) -> Self {
        self.strict_decoding = true;
        self
    }

    /// Replay `payloads` in order and return the rebuilt state.
    pub fn replay<P: AsRef<[u8]>>(&self, payloads: &[P]) -> Result<ReplayResult, ReplayError> {
        let start = Instant::now();
        info!(payload_count = payloads.len(), "Starting payload replay");

        let store = Arc::new(TrajectoryStore::new());
        let mut ingester = StreamIngester::new(Arc::clone(&store), Arc::new(SyncMetrics::new()));

        for (index, payload) in payloads.iter().enumerate() {
            if let Err(source) = ingester.ingest(payload.as_ref()) {
                if self.strict_decoding {
                    error!(index, error = %source, "Undecodable payload in strict replay");
                    return Err(ReplayError::UndecodablePayload { index, source });
                }
            }
        }

        let state = store.snapshot();
        let state_checksum = state.checksum();

        if let Some(ref expected) = self.expected_checksum {
            if &state_checksum != expected {
                error!(
                    expected = %expected,
                    actual = %state_checksum,
                    "State checksum mismatch after replay"
                );
                return Err(ReplayError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: state_checksum,
                });
            }
        }

        let metrics = ReplayMetrics {
            payloads_replayed: ingester.updates_accepted(),
            payloads_dropped: ingester.updates_dropped(),
            duration_ms: start.elapsed().as_millis(),
            state_checksum,
        };

        info!(
            payloads_replayed = metrics.payloads_replayed,
            payloads_dropped = metrics.payloads_dropped,
            entities = state.entity_count(),
            duration_ms = metrics.duration_ms as u64,
            "Replay completed"
        );

        Ok(ReplayResult { state, metrics })
    }
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}
