use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::circuit_breaker::CircuitBreakers;
use crate::config::ServiceConfig;
use crate::error::ConfigError;

// One logical backend service with a fixed instance list
pub struct ServiceTarget {
    pub name: String,
    pub instances: Vec<String>,
    cursor: AtomicUsize,
}

impl ServiceTarget {
    pub fn new(name: String, instances: Vec<String>) -> Result<Self, ConfigError> {
        if instances.is_empty() {
            return Err(ConfigError::EmptyInstances(name));
        }
        Ok(Self {
            name,
            instances,
            cursor: AtomicUsize::new(0),
        })
    }

    // fetch_add makes read-then-increment atomic, wrapping happens at the modulo
    fn next_instance(&self) -> &str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.instances.len();
        &self.instances[idx]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Instance(String),
    Unavailable,
    UnknownService,
}

// Round-robin load balancer over every configured service, gated by its breaker
pub struct LoadBalancer {
    services: HashMap<String, ServiceTarget>,
    breakers: Arc<CircuitBreakers>,
}

impl LoadBalancer {
    pub fn new(
        services: &[ServiceConfig],
        breakers: Arc<CircuitBreakers>,
    ) -> Result<Self, ConfigError> {
        let mut targets = HashMap::with_capacity(services.len());

        for service in services {
            if !breakers.contains(&service.name) {
                return Err(ConfigError::UnknownService(service.name.clone()));
            }
            let target = ServiceTarget::new(service.name.clone(), service.instances.clone())?;
            if targets.insert(service.name.clone(), target).is_some() {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
        }

        if targets.is_empty() {
            return Err(ConfigError::NoServices);
        }

        tracing::info!("Load balancer initialized with {} services", targets.len());
        for target in targets.values() {
            tracing::info!(service = %target.name, instances = ?target.instances, "service registered");
        }

        Ok(Self {
            services: targets,
            breakers,
        })
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn service(&self, service: &str) -> Option<&ServiceTarget> {
        self.services.get(service)
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceTarget> {
        self.services.values()
    }

    /// Pick the next instance for `service`.
    ///
    /// The breaker is consulted first; when it refuses, the cursor is left
    /// untouched so the rotation resumes where it stopped.
    pub fn select_instance(&self, service: &str) -> Selection {
        let Some(target) = self.services.get(service) else {
            return Selection::UnknownService;
        };

        if !self.breakers.is_available(service) {
            return Selection::Unavailable;
        }

        Selection::Instance(target.next_instance().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerConfig;
    use std::time::Duration;

    fn setup(instances: &[&str]) -> (LoadBalancer, Arc<CircuitBreakers>) {
        let config = vec![ServiceConfig {
            name: "chat".into(),
            instances: instances.iter().map(|s| s.to_string()).collect(),
        }];
        let breakers = Arc::new(CircuitBreakers::new(
            ["chat"],
            BreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_secs(60),
            },
        ));
        let lb = LoadBalancer::new(&config, breakers.clone()).unwrap();
        (lb, breakers)
    }

    #[test]
    fn test_round_robin() {
        let (lb, _) = setup(&["node1", "node2", "node3"]);

        assert_eq!(lb.select_instance("chat"), Selection::Instance("node1".into()));
        assert_eq!(lb.select_instance("chat"), Selection::Instance("node2".into()));
        assert_eq!(lb.select_instance("chat"), Selection::Instance("node3".into()));
        assert_eq!(lb.select_instance("chat"), Selection::Instance("node1".into()));
        // wraps around
    }

    #[test]
    fn test_round_robin_is_fair() {
        let (lb, _) = setup(&["a", "b", "c"]);
        let mut counts: HashMap<String, usize> = HashMap::new();

        for _ in 0..100 {
            match lb.select_instance("chat") {
                Selection::Instance(addr) => *counts.entry(addr).or_default() += 1,
                other => panic!("unexpected selection {:?}", other),
            }
        }

        assert_eq!(counts["a"], 34);
        assert_eq!(counts["b"], 33);
        assert_eq!(counts["c"], 33);
    }

    #[test]
    fn test_single_instance() {
        let (lb, _) = setup(&["only-node"]);
        assert_eq!(lb.select_instance("chat"), Selection::Instance("only-node".into()));
        assert_eq!(lb.select_instance("chat"), Selection::Instance("only-node".into()));
    }

    #[test]
    fn test_open_breaker_does_not_advance_cursor() {
        let (lb, breakers) = setup(&["node1", "node2"]);
        assert_eq!(lb.select_instance("chat"), Selection::Instance("node1".into()));

        breakers.record_outcome("chat", false);
        breakers.record_outcome("chat", false);
        assert_eq!(lb.select_instance("chat"), Selection::Unavailable);
        assert_eq!(lb.select_instance("chat"), Selection::Unavailable);

        assert_eq!(lb.service("chat").unwrap().next_instance(), "node2");
    }

    #[test]
    fn test_unknown_service() {
        let (lb, _) = setup(&["node1"]);
        assert_eq!(lb.select_instance("billing"), Selection::UnknownService);
    }

    #[test]
    fn test_empty_instances_is_config_error() {
        let breakers = Arc::new(CircuitBreakers::new(["chat"], BreakerConfig::default()));
        let config = vec![ServiceConfig {
            name: "chat".into(),
            instances: vec![],
        }];
        assert!(matches!(
            LoadBalancer::new(&config, breakers),
            Err(ConfigError::EmptyInstances(_))
        ));
    }

    #[test]
    fn test_service_without_breaker_is_config_error() {
        let breakers = Arc::new(CircuitBreakers::new(["user"], BreakerConfig::default()));
        let config = vec![ServiceConfig {
            name: "chat".into(),
            instances: vec!["node1".into()],
        }];
        assert!(matches!(
            LoadBalancer::new(&config, breakers),
            Err(ConfigError::UnknownService(name)) if name == "chat"
        ));
    }
}
