use crate::http::handlers::{fleet, health};
use crate::http::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/fleet", get(fleet::get_fleet))
        .route("/fleet/:id", get(fleet::get_trajectory))
        .route("/health", get(health::get_health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
