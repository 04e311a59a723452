//! API gateway in front of a fixed set of backend services.
//!
//! Inbound requests pass the rate limiter, then the [`dispatcher::Dispatcher`]
//! consults the response cache, picks an instance round-robin behind a
//! per-service circuit breaker, calls the backend and classifies the result.

pub mod backend;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod load_balancer;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use config::{Args, GatewayConfig};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, DispatchError, MetricsError};
pub use handlers::router;
pub use state::AppState;
