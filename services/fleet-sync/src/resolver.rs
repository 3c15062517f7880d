//! Entity resolution
//!
//! Precedence: `truckId`, then `id`, then [`UNKNOWN_ENTITY`]. Empty strings
//! count as absent, so every update is attributable to some entity.

use fleet_types::ids::{EntityId, UNKNOWN_ENTITY};

use crate::events::RawUpdate;

pub fn resolve(update: &RawUpdate) -> EntityId {
    non_empty(update.truck_id.as_deref())
        .or_else(|| non_empty(update.id.as_deref()))
        .map(EntityId::from)
        .unwrap_or_else(|| EntityId::from(UNKNOWN_ENTITY))
}

fn non_empty(field: Option<&str>) -> Option<&str> {
    field.filter(|s| !s.is_empty())
}
