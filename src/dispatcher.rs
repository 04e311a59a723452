//! Request dispatch: cache → instance selection (breaker gated) → backend call
//! → cache update → breaker update → error classification.
//!
//! The cache is always consulted before the balancer, and the balancer before
//! any backend I/O. A failed call is reported once and never retried here.

use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::backend::Upstream;
use crate::cache::{self, ResponseCache};
use crate::circuit_breaker::{CircuitBreakers, CircuitState};
use crate::config::GatewayConfig;
use crate::error::{ConfigError, DispatchError};
use crate::load_balancer::{LoadBalancer, Selection};
use crate::metrics::{self, CACHE_HITS, CACHE_MISSES};
use crate::models::{BackendOutcome, GatewayResponse, LogicalRequest};

pub struct Dispatcher<U> {
    upstream: U,
    balancer: LoadBalancer,
    breakers: Arc<CircuitBreakers>,
    cache: ResponseCache,
    cache_ttl: Duration,
}

impl<U: Upstream> Dispatcher<U> {
    pub fn new(config: &GatewayConfig, upstream: U) -> Result<Self, ConfigError> {
        let breakers = Arc::new(CircuitBreakers::new(
            config.services.iter().map(|s| s.name.as_str()),
            config.breaker,
        ));
        let balancer = LoadBalancer::new(&config.services, breakers.clone())?;

        Ok(Self {
            upstream,
            balancer,
            breakers,
            cache: ResponseCache::new(),
            cache_ttl: config.cache_ttl,
        })
    }

    pub fn knows(&self, service: &str) -> bool {
        self.balancer.contains(service)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn breakers(&self) -> &CircuitBreakers {
        &self.breakers
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub async fn dispatch(&self, req: &LogicalRequest) -> Result<GatewayResponse, DispatchError> {
        let start = Instant::now();
        let result = self.dispatch_inner(req).await;

        let status = match &result {
            Ok(res) => res.status,
            Err(e) => e.status().as_u16(),
        };
        metrics::observe_request(req.verb, &req.route(), status, start.elapsed());
        tracing::debug!(
            verb = %req.verb,
            path = %req.path(),
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request dispatched"
        );

        result
    }

    async fn dispatch_inner(&self, req: &LogicalRequest) -> Result<GatewayResponse, DispatchError> {
        let cache_key = req.cache_key.as_deref().filter(|_| req.verb.is_read());

        // check cache first
        if let Some(key) = cache_key {
            if let Some(body) = self.cache.get(key) {
                CACHE_HITS.inc();
                tracing::debug!(key, "cache hit");
                return Ok(GatewayResponse {
                    status: 200,
                    body: Some(body),
                    from_cache: true,
                });
            }
            CACHE_MISSES.inc();
            tracing::debug!(key, "cache miss");
        }
        // a write that lands while this read is in flight bumps the generation
        let fill_generation = cache_key.map(|key| self.cache.generation(key));

        let instance = match self.balancer.select_instance(&req.service) {
            Selection::Instance(addr) => addr,
            Selection::Unavailable => {
                return Err(DispatchError::BackendUnavailable {
                    service: req.service.clone(),
                });
            }
            Selection::UnknownService => {
                return Err(DispatchError::UnknownService(req.service.clone()));
            }
        };

        let Some(url) = req.backend_url(&instance) else {
            return Err(DispatchError::BackendTransportFailure {
                service: req.service.clone(),
                reason: format!("invalid instance address `{}`", instance),
            });
        };
        tracing::debug!(service = %req.service, %instance, "using backend");

        let outcome = self.upstream.call(req.verb, &url, req.body.as_ref()).await;
        self.breakers.record_outcome(&req.service, outcome.is_success());

        match outcome {
            BackendOutcome::Success { status, body } => {
                if let (Some(key), Some(generation), Some(value)) =
                    (cache_key, fill_generation, body.as_ref())
                {
                    if !self
                        .cache
                        .set_if_unchanged(key, generation, value.clone(), self.cache_ttl)
                    {
                        tracing::debug!(key, "cache fill skipped, key invalidated meanwhile");
                    }
                }
                if req.verb.is_mutation() {
                    self.invalidate_for(req);
                }
                Ok(GatewayResponse {
                    status,
                    body,
                    from_cache: false,
                })
            }
            // cache left alone on failure, stale beats nothing
            BackendOutcome::ApplicationError { status, body } => {
                tracing::warn!(service = %req.service, %instance, status, "backend returned error");
                Err(DispatchError::BackendApplicationError { status, body })
            }
            BackendOutcome::Timeout => {
                tracing::warn!(service = %req.service, %instance, "backend call timed out");
                Err(DispatchError::BackendTimeout {
                    service: req.service.clone(),
                })
            }
            BackendOutcome::TransportFailure(reason) => {
                tracing::warn!(service = %req.service, %instance, %reason, "backend transport failure");
                Err(DispatchError::BackendTransportFailure {
                    service: req.service.clone(),
                    reason,
                })
            }
        }
    }

    // A successful mutation drops the collection key, the per-id key when an id is
    // present, and whatever key the caller attached to the request.
    fn invalidate_for(&self, req: &LogicalRequest) {
        self.cache.invalidate(&cache::collection_key(&req.service));
        if let Some(id) = &req.resource_id {
            self.cache.invalidate(&cache::item_key(&req.service, id));
        }
        if let Some(key) = &req.cache_key {
            self.cache.invalidate(key);
        }
    }

    pub fn circuit_state(&self, service: &str) -> Option<CircuitState> {
        self.breakers.state(service)
    }
}
