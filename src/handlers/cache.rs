use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;
use crate::state::AppState;

// Read-only snapshot of the response cache, for operators
pub async fn cache_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dispatcher.cache().list_all())
}
