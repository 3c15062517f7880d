//! Position and trajectory value types
//!
//! A `Trajectory` owns its history behind an `Arc` so that snapshots of the
//! fleet can share it; appending clones the buffer only when a snapshot is
//! still holding the previous version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single WGS84 coordinate pair.
///
/// No bounds are enforced; decoders only guarantee both values are finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

impl From<(f64, f64)> for Position {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// Current position plus the ordered history of every accepted position.
///
/// Invariants:
/// - `history` is never empty
/// - `current == history.last()`
/// - `history` is append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrajectoryRepr")]
pub struct Trajectory {
    current: Position,
    history: Arc<Vec<Position>>,
}

impl Trajectory {
    /// Start a trajectory from its first accepted position.
    pub fn start(position: Position) -> Self {
        Self {
            current: position,
            history: Arc::new(vec![position]),
        }
    }

    /// Append a position and make it current.
    pub fn push(&mut self, position: Position) {
        Arc::make_mut(&mut self.history).push(position);
        self.current = position;
    }

    pub fn current(&self) -> Position {
        self.current
    }

    pub fn history(&self) -> &[Position] {
        &self.history
    }

    /// Number of points in the history.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Always false; a trajectory exists only once it has a point.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Check the current/history invariant.
    pub fn check_invariant(&self) -> bool {
        self.history.last() == Some(&self.current)
    }

    /// Whether two trajectories share the same history buffer.
    pub fn shares_history_with(&self, other: &Trajectory) -> bool {
        Arc::ptr_eq(&self.history, &other.history)
    }
}

#[derive(Deserialize)]
struct TrajectoryRepr {
    current: Position,
    history: Vec<Position>,
}

impl TryFrom<TrajectoryRepr> for Trajectory {
    type Error = String;

    fn try_from(repr: TrajectoryRepr) -> Result<Self, Self::Error> {
        match repr.history.last() {
            None => Err("trajectory history must not be empty".to_string()),
            Some(last) if *last != repr.current => {
                Err("trajectory current must equal the last history point".to_string())
            }
            Some(_) => Ok(Self {
                current: repr.current,
                history: Arc::new(repr.history),
            }),
        }
    }
}
