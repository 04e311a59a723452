use axum::{http::StatusCode, response::IntoResponse};
use crate::metrics;

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
