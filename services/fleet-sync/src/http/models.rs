use std::collections::BTreeMap;

use fleet_sync::connection::ConnectionState;
use fleet_types::ids::EntityId;
use fleet_types::position::Position;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryResponse {
    pub entity_id: EntityId,
    /// Store version the trajectory was read at.
    pub version: u64,
    pub current: Position,
    pub history: Vec<Position>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service_version: &'static str,
    pub connection: ConnectionState,
    pub store_version: u64,
    pub entities: usize,
    pub metrics: BTreeMap<String, u64>,
}
