use axum::{Json, extract::State, response::IntoResponse};
use serde_json::{Map, json};
use std::sync::Arc;
use crate::state::AppState;

// health handler, includes breaker state per service
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dispatcher = &state.dispatcher;
    let mut services = Map::new();

    for target in dispatcher.balancer().services() {
        services.insert(
            target.name.clone(),
            json!({
                "state": dispatcher.circuit_state(&target.name),
                "instances": target.instances,
            }),
        );
    }

    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "services": services,
    }))
}
