use crate::http::models::HealthResponse;
use crate::http::state::AppState;
use axum::{extract::State, Json};
use fleet_sync::connection::ConnectionState;

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connection = *state.connection.borrow();
    let snapshot = state.subscriber.current_state();

    Json(HealthResponse {
        status: if connection == ConnectionState::Active {
            "ok"
        } else {
            "degraded"
        },
        service_version: fleet_sync::SERVICE_VERSION,
        connection,
        store_version: snapshot.version(),
        entities: snapshot.entity_count(),
        metrics: state.metrics.export(),
    })
}
