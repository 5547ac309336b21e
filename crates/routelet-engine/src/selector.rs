//! Load balancing strategies over candidate instances

use rand::Rng;
use routelet_core::{LoadBalanceStrategy, ServiceInstance};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Picks one instance from a candidate list.
///
/// Stateless per call apart from the round-robin cursors: one monotonic
/// counter per service name, created lazily, shared by all callers and
/// never reset when the instance list changes.
pub struct Selector {
    cursors: RwLock<HashMap<String, AtomicUsize>>,
}

impl Selector {
    /// Create a new selector
    pub fn new() -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Select one instance from a non-empty candidate list.
    ///
    /// Returns `None` only for an empty list; the caller is expected to
    /// guard that case.
    pub async fn pick<'a>(
        &self,
        candidates: &[&'a ServiceInstance],
        service_name: &str,
        strategy: LoadBalanceStrategy,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }

        let index = match strategy {
            LoadBalanceStrategy::Random => rand::thread_rng().gen_range(0..candidates.len()),
            LoadBalanceStrategy::RoundRobin => {
                self.next_cursor(service_name).await % candidates.len()
            }
            LoadBalanceStrategy::WeightedRandom => weighted_index(candidates),
        };

        debug!(
            service = service_name,
            strategy = %strategy,
            selected_index = index,
            total_candidates = candidates.len(),
            "Selected instance"
        );

        candidates.get(index).copied()
    }

    /// Post-increment the per-service round-robin cursor
    async fn next_cursor(&self, service_name: &str) -> usize {
        {
            let cursors = self.cursors.read().await;
            if let Some(counter) = cursors.get(service_name) {
                return counter.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut cursors = self.cursors.write().await;
        cursors
            .entry(service_name.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw an index with probability proportional to positive weight.
///
/// Instances with non-positive (or non-finite) weight carry no selection
/// mass; if nothing carries mass the draw degrades to uniform so a
/// non-empty list always yields a pick.
fn weighted_index(candidates: &[&ServiceInstance]) -> usize {
    let total: f64 = candidates.iter().map(|i| positive_weight(i)).sum();
    let mut rng = rand::thread_rng();
    if total <= 0.0 {
        return rng.gen_range(0..candidates.len());
    }

    let mut point = rng.gen_range(0.0..total);
    let mut last_positive = 0;
    for (index, instance) in candidates.iter().enumerate() {
        let weight = positive_weight(instance);
        if weight <= 0.0 {
            continue;
        }
        last_positive = index;
        if point < weight {
            return index;
        }
        point -= weight;
    }
    // Float rounding can walk the point past the final bucket
    last_positive
}

fn positive_weight(instance: &ServiceInstance) -> f64 {
    if instance.weight.is_finite() && instance.weight > 0.0 {
        instance.weight
    } else {
        0.0
    }
}
