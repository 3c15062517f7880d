use crate::http::error::AppError;
use crate::http::models::TrajectoryResponse;
use crate::http::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use fleet_sync::snapshot::FleetSnapshot;
use fleet_types::ids::EntityId;

pub async fn get_fleet(State(state): State<AppState>) -> Json<FleetSnapshot> {
    Json(state.subscriber.current_state())
}

pub async fn get_trajectory(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<TrajectoryResponse>, AppError> {
    let snapshot = state.subscriber.current_state();
    let trajectory = snapshot
        .get(&entity_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown entity {}", entity_id)))?;

    Ok(Json(TrajectoryResponse {
        entity_id: EntityId::new(entity_id.as_str()),
        version: snapshot.version(),
        current: trajectory.current(),
        history: trajectory.history().to_vec(),
    }))
}
