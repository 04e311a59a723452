use crate::backend::HttpBackend;
use crate::config::GatewayConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ConfigError;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub dispatcher: Dispatcher<HttpBackend>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let backend = HttpBackend::new(config.backend_timeout)?;
        Ok(Self {
            dispatcher: Dispatcher::new(config, backend)?,
            rate_limiter: RateLimiter::new(config.rate_limit),
        })
    }
}
