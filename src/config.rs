use clap::Parser;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::ConfigError;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "api-gateway")]
#[command(about = "API gateway with caching, circuit breaking and rate limiting")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    // Backend services, repeatable
    // Example: --service chat=localhost:5001,localhost:5011
    #[arg(
        short,
        long = "service",
        value_name = "NAME=ADDR[,ADDR...]",
        default_values_t = [
            "chat=chat-service:5001".to_string(),
            "user=user-service:5002".to_string(),
        ]
    )]
    pub services: Vec<String>,

    // Consecutive failures tolerated before the breaker opens
    #[arg(long, default_value_t = 5)]
    pub failure_threshold: u32,

    // How long an open breaker refuses calls, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub reset_timeout_ms: u64,

    // Cache TTL in seconds
    #[arg(short, long, default_value_t = 30)]
    pub cache_ttl: u64,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in milliseconds
    #[arg(long, default_value_t = 60_000)]
    pub rate_window_ms: u64,

    // Backend call timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub timeout_ms: u64,
}

// One backend service and its fixed instance list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub instances: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Validated gateway configuration.
///
/// Built once at startup; everything downstream assumes these invariants hold
/// (non-empty instance lists, unique service names, positive limits).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub services: Vec<ServiceConfig>,
    pub breaker: BreakerConfig,
    pub cache_ttl: Duration,
    pub rate_limit: RateLimitConfig,
    pub backend_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(services: Vec<ServiceConfig>) -> Result<Self, ConfigError> {
        let config = Self {
            port: 3000,
            services,
            breaker: BreakerConfig::default(),
            cache_ttl: Duration::from_secs(30),
            rate_limit: RateLimitConfig::default(),
            backend_timeout: Duration::from_secs(5),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.instances.is_empty() {
                return Err(ConfigError::EmptyInstances(service.name.clone()));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::NonPositive("failure-threshold"));
        }
        if self.rate_limit.max == 0 {
            return Err(ConfigError::NonPositive("rate-limit"));
        }
        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::NonPositive("rate-window-ms"));
        }
        if self.backend_timeout.is_zero() {
            return Err(ConfigError::NonPositive("timeout-ms"));
        }
        Ok(())
    }
}

impl Args {
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let services = self
            .services
            .iter()
            .map(|raw| parse_service(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let config = GatewayConfig {
            port: self.port,
            services,
            breaker: BreakerConfig {
                failure_threshold: self.failure_threshold,
                reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            },
            cache_ttl: Duration::from_secs(self.cache_ttl),
            rate_limit: RateLimitConfig {
                max: self.rate_limit,
                window: Duration::from_millis(self.rate_window_ms),
            },
            backend_timeout: Duration::from_millis(self.timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

// Parse "chat=localhost:5001, localhost:5011" into a service config
pub fn parse_service(raw: &str) -> Result<ServiceConfig, ConfigError> {
    let (name, addrs) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidServiceSpec(raw.to_string()))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::InvalidServiceSpec(raw.to_string()));
    }

    let instances: Vec<String> = addrs
        .split(',')
        .map(|s| s.trim()) // remove spaces
        .filter(|s| !s.is_empty())
        .map(normalize_address)
        .collect();

    if instances.is_empty() {
        return Err(ConfigError::EmptyInstances(name.to_string()));
    }
    if let Some(bad) = instances
        .iter()
        .find(|addr| Url::parse(addr).map_or(true, |u| u.cannot_be_a_base()))
    {
        return Err(ConfigError::InvalidAddress(bad.clone()));
    }

    Ok(ServiceConfig {
        name: name.to_string(),
        instances,
    })
}

// add http:// if not present, drop a trailing slash
fn normalize_address(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}
