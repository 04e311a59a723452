mod cache;
mod health;
mod metrics;
mod proxy;
mod rate_limit;

use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use crate::state::AppState;

pub use cache::cache_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use proxy::{create_handler, delete_handler, get_handler, list_handler, update_handler};
pub use rate_limit::rate_limit_middleware;

// Everything under /api goes through the rate limiter; operational routes do not
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/{service}", get(list_handler).post(create_handler))
        .route(
            "/api/{service}/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/cache", get(cache_handler))
        .merge(api)
        .with_state(state)
}
