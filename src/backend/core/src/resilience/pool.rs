//! Per-service circuit breakers created on first use.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::circuit_breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};
use crate::clock::{Clock, SystemClock};
use crate::registry::KeyedRegistry;

/// Pool of breakers keyed by service name.
///
/// Every breaker shares the pool's default thresholds and clock. An unknown
/// service is not an error: its breaker is created Closed on first reference.
pub struct CircuitBreakerPool {
    defaults: BreakerConfig,
    clock: Arc<dyn Clock>,
    breakers: KeyedRegistry<CircuitBreaker>,
}

impl std::fmt::Debug for CircuitBreakerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerPool")
            .field("defaults", &self.defaults)
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

impl Default for CircuitBreakerPool {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl CircuitBreakerPool {
    pub fn new(defaults: BreakerConfig) -> Self {
        Self {
            defaults: defaults.normalized(),
            clock: Arc::new(SystemClock::new()),
            breakers: KeyedRegistry::new(),
        }
    }

    /// Use a different time source for every breaker this pool creates.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn defaults(&self) -> &BreakerConfig {
        &self.defaults
    }

    /// Breaker for `service`, created with the pool defaults on first access.
    pub fn get(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers.get_or_insert_with(service, || {
            tracing::debug!(service = service, "Creating circuit breaker");
            CircuitBreaker::new(self.defaults.clone())
                .with_name(service)
                .with_clock(Arc::clone(&self.clock))
        })
    }

    /// Whether a call to `service` may be attempted right now.
    pub fn is_allowed(&self, service: &str) -> bool {
        self.get(service).is_allowed()
    }

    /// Route a call outcome to the service's breaker.
    pub fn record_result(&self, service: &str, success: bool) {
        let breaker = self.get(service);
        if success {
            breaker.record_success();
        } else {
            breaker.record_failure();
        }
    }

    /// Current state of every tracked breaker, ordered by service name.
    pub fn service_states(&self) -> BTreeMap<String, CircuitState> {
        self.breakers
            .snapshot()
            .into_iter()
            .map(|(name, breaker)| (name, breaker.state()))
            .collect()
    }

    /// Full snapshots of every tracked breaker, ordered by service name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers
            .snapshot()
            .into_values()
            .map(|breaker| breaker.snapshot())
            .collect()
    }

    /// Reset one breaker. Returns false if the service was never seen.
    pub fn reset(&self, service: &str) -> bool {
        match self.breakers.get(service) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every tracked breaker to Closed.
    pub fn reset_all(&self) {
        for breaker in self.breakers.snapshot().into_values() {
            breaker.reset();
        }
        tracing::info!("All circuit breakers reset");
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn pool(threshold: i64) -> (CircuitBreakerPool, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let pool = CircuitBreakerPool::new(BreakerConfig::new(threshold, 1000))
            .with_clock(clock.clone());
        (pool, clock)
    }

    #[test]
    fn test_unknown_service_starts_closed() {
        let (pool, _) = pool(3);
        assert!(pool.is_empty());
        assert!(pool.is_allowed("ledger"));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get("ledger").state(), CircuitState::Closed);
    }

    #[test]
    fn test_get_returns_same_breaker() {
        let (pool, _) = pool(3);
        let a = pool.get("dispatch");
        let b = pool.get("dispatch");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "dispatch");
    }

    #[test]
    fn test_services_are_isolated() {
        let (pool, _) = pool(2);
        pool.record_result("payments", false);
        pool.record_result("payments", false);
        pool.record_result("inventory", true);

        let states = pool.service_states();
        assert_eq!(states.get("payments"), Some(&CircuitState::Open));
        assert_eq!(states.get("inventory"), Some(&CircuitState::Closed));
        assert!(!pool.is_allowed("payments"));
        assert!(pool.is_allowed("inventory"));
    }

    #[test]
    fn test_pool_breakers_share_clock() {
        let (pool, clock) = pool(1);
        pool.record_result("search", false);
        assert_eq!(pool.get("search").state(), CircuitState::Open);

        clock.advance_ms(1000);
        assert_eq!(pool.service_states()["search"], CircuitState::HalfOpen);
    }

    #[test]
    fn test_reset_and_reset_all() {
        let (pool, _) = pool(1);
        pool.record_result("a", false);
        pool.record_result("b", false);

        assert!(pool.reset("a"));
        assert!(!pool.reset("never-seen"));
        assert_eq!(pool.get("a").state(), CircuitState::Closed);
        assert_eq!(pool.get("b").state(), CircuitState::Open);

        pool.reset_all();
        assert!(pool
            .service_states()
            .values()
            .all(|state| *state == CircuitState::Closed));
    }

    #[test]
    fn test_defaults_are_normalized() {
        let pool = CircuitBreakerPool::new(BreakerConfig::new(-1, 0));
        assert_eq!(pool.defaults(), &BreakerConfig::default());
    }
}
