//! Selection engine: blacklist filtering, strategy dispatch, fallback

use crate::blacklist::Blacklist;
use crate::probe::{ProbeHandle, RecoveryProbe};
use crate::selector::Selector;
use routelet_core::{
    EngineConfig, LoadBalanceStrategy, RouteletError, RouteletResult, ServiceInstance,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Orchestrates instance selection for registry-supplied candidate lists.
///
/// Filters candidates through the blacklist, delegates to the configured
/// load-balancing strategy, and guarantees a pick whenever the caller's
/// list is non-empty.
pub struct SelectionEngine {
    blacklist: Blacklist,
    selector: Selector,
    default_strategy: LoadBalanceStrategy,
    probe: Mutex<Option<ProbeHandle>>,
}

impl SelectionEngine {
    /// Create an engine and start its background recovery probe.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: EngineConfig) -> RouteletResult<Self> {
        let blacklist = Blacklist::new(&config.blacklist)?;
        let probe = RecoveryProbe::new(blacklist.clone()).spawn();
        Ok(Self {
            blacklist,
            selector: Selector::new(),
            default_strategy: config.default_strategy,
            probe: Mutex::new(Some(probe)),
        })
    }

    /// Select one instance for a service.
    ///
    /// Blacklisted candidates are filtered out first. When every candidate
    /// is blacklisted the full list is used instead, so blacklisting alone
    /// never reduces availability to zero. `None` for `strategy` means the
    /// configured default. The only error is an empty `instances` list.
    pub async fn select(
        &self,
        instances: &[ServiceInstance],
        service_name: &str,
        strategy: Option<LoadBalanceStrategy>,
    ) -> RouteletResult<ServiceInstance> {
        if instances.is_empty() {
            return Err(RouteletError::NoInstanceAvailable(service_name.to_string()));
        }

        let mut allowed = Vec::with_capacity(instances.len());
        for instance in instances {
            if !self.blacklist.is_blacklisted(&instance.ip, instance.port).await {
                allowed.push(instance);
            }
        }

        let candidates = if allowed.is_empty() {
            warn!(
                service = service_name,
                total = instances.len(),
                "All instances blacklisted, falling back to full candidate list"
            );
            instances.iter().collect()
        } else {
            allowed
        };

        let strategy = strategy.unwrap_or(self.default_strategy);
        let picked = self
            .selector
            .pick(&candidates, service_name, strategy)
            .await
            .ok_or_else(|| RouteletError::NoInstanceAvailable(service_name.to_string()))?;
        Ok(picked.clone())
    }

    /// Record a connection-level failure against an address.
    ///
    /// Thin pass-through to the blacklist; the HTTP interception layer
    /// calls this before retrying with a fresh `select`.
    pub async fn report_failure(&self, ip: &str, port: u16, reason: &str) {
        info!(
            address = %format!("{}:{}", ip, port),
            reason = reason,
            "Failure reported"
        );
        self.blacklist.add(ip, port, reason).await;
    }

    /// The blacklist handle, for the operational surface
    /// (snapshots, clear, runtime setters)
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// The strategy used when `select` is called without one
    pub fn default_strategy(&self) -> LoadBalanceStrategy {
        self.default_strategy
    }

    /// Stop the background probe and wait for it to quiesce.
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub async fn stop(&self) {
        if let Some(handle) = self.probe.lock().await.take() {
            handle.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routelet_core::BlacklistConfig;
    use std::time::Duration;

    fn test_engine() -> SelectionEngine {
        SelectionEngine::new(EngineConfig {
            blacklist: BlacklistConfig {
                ttl_seconds: 10.0,
                // Long interval keeps the probe out of these tests
                probe_interval_secs: 60.0,
                connection_timeout_secs: 0.5,
            },
            default_strategy: LoadBalanceStrategy::Random,
        })
        .unwrap()
    }

    fn three_instances() -> Vec<ServiceInstance> {
        vec![
            ServiceInstance::new("svc", "192.168.1.21", 8080),
            ServiceInstance::new("svc", "192.168.1.22", 8080),
            ServiceInstance::new("svc", "192.168.1.23", 8080),
        ]
    }

    #[tokio::test]
    async fn test_select_filters_blacklisted() {
        let engine = test_engine();
        let instances = three_instances();
        engine.report_failure("192.168.1.22", 8080, "refused").await;

        for _ in 0..1000 {
            let picked = engine
                .select(&instances, "svc", Some(LoadBalanceStrategy::Random))
                .await
                .unwrap();
            assert_ne!(picked.ip, "192.168.1.22");
        }
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_select_returns_only_supplied_instances() {
        let engine = test_engine();
        let instances = three_instances();

        for _ in 0..200 {
            let picked = engine.select(&instances, "svc", None).await.unwrap();
            assert!(instances.iter().any(|i| i.address() == picked.address()));
        }
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_emergency_fallback_when_all_blacklisted() {
        let engine = test_engine();
        let instances = vec![
            ServiceInstance::new("svc", "192.168.1.24", 8080),
            ServiceInstance::new("svc", "192.168.1.25", 8080),
        ];
        for instance in &instances {
            engine
                .report_failure(&instance.ip, instance.port, "fallback test")
                .await;
        }

        // Still returns one of the supplied instances, never an error
        for _ in 0..50 {
            let picked = engine.select(&instances, "svc", None).await.unwrap();
            assert!(instances.iter().any(|i| i.address() == picked.address()));
        }
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_empty_instances_is_the_only_error() {
        let engine = test_engine();
        let err = engine.select(&[], "svc", None).await.unwrap_err();
        assert!(matches!(err, RouteletError::NoInstanceAvailable(ref s) if s == "svc"));
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_round_robin_through_engine() {
        let engine = test_engine();
        let instances = three_instances();

        let mut ips = Vec::new();
        for _ in 0..6 {
            let picked = engine
                .select(&instances, "svc", Some(LoadBalanceStrategy::RoundRobin))
                .await
                .unwrap();
            ips.push(picked.ip);
        }
        assert_eq!(ips[..3], ips[3..]);
        assert_eq!(
            ips[..3].iter().collect::<std::collections::HashSet<_>>().len(),
            3
        );
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_report_failure_populates_blacklist() {
        let engine = test_engine();
        engine.report_failure("10.0.0.1", 9000, "refused").await;

        assert!(engine.blacklist().is_blacklisted("10.0.0.1", 9000).await);
        let all = engine.blacklist().get_all().await;
        assert_eq!(all.get("10.0.0.1:9000").map(String::as_str), Some("refused"));
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_blacklist_expiry_reopens_instance() {
        let engine = SelectionEngine::new(EngineConfig {
            blacklist: BlacklistConfig {
                ttl_seconds: 0.2,
                probe_interval_secs: 60.0,
                connection_timeout_secs: 0.5,
            },
            default_strategy: LoadBalanceStrategy::Random,
        })
        .unwrap();

        engine.report_failure("10.0.0.1", 9000, "refused").await;
        assert!(engine.blacklist().is_blacklisted("10.0.0.1", 9000).await);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!engine.blacklist().is_blacklisted("10.0.0.1", 9000).await);
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let engine = test_engine();
        engine.stop().await;
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_select_and_report() {
        use std::sync::Arc;

        let engine = Arc::new(test_engine());
        let instances = Arc::new(three_instances());
        let mut tasks = tokio::task::JoinSet::new();

        for i in 0..6 {
            let engine = Arc::clone(&engine);
            let instances = Arc::clone(&instances);
            tasks.spawn(async move {
                for n in 0..100 {
                    if i % 2 == 0 {
                        let picked = engine.select(&instances, "svc", None).await.unwrap();
                        assert!(instances.iter().any(|x| x.address() == picked.address()));
                    } else if n % 10 == 0 {
                        engine.report_failure("192.168.1.22", 8080, "flaky").await;
                    }
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }
        engine.stop().await;
    }
}
