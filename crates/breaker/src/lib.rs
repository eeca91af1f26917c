//! Circuit Breaker Registry (C6) — per-provider three-state admission
//! controllers sharing one configuration, used by both the Context
//! Assembler's layer fetches (C7) and the AAL router's provider calls (C8).
//!
//! Grounded on the python original's `circuit_breaker.py`: same three
//! states, same default thresholds, same `is_request_allowed`
//! side-effecting the OPEN→HALF_OPEN transition on a time-gated check, same
//! registry-creates-lazily-on-first-lookup behavior.

use archon_domain::config::BreakerConfig;
use archon_domain::trace::TraceEvent;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn label(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
    half_open_successes: u32,
}

/// A single provider's breaker. State transitions are compare-and-set
/// cheap: callers reading `state()` may observe a lagging view but never
/// an invalid one, since every mutation holds the same lock for its
/// duration.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: RwLock<Inner>,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub failure_count: u32,
}

impl CircuitBreaker {
    fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                opened_at: None,
                half_open_successes: 0,
            }),
        }
    }

    /// Evaluate admission, performing the time-gated OPEN→HALF_OPEN
    /// transition as a side effect (spec.md §4.5 "Admission").
    pub fn is_request_allowed(&self) -> bool {
        let mut inner = self.inner.write();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_secs(self.config.timeout_secs) {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    TraceEvent::CircuitStateChanged {
                        provider: self.name.clone(),
                        from_state: BreakerState::Open.label().to_string(),
                        to_state: BreakerState::HalfOpen.label().to_string(),
                    }
                    .emit();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Read state without admitting a request (observer path).
    pub fn state(&self) -> BreakerState {
        self.inner.read().state
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.read();
        BreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    let from = inner.state;
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.opened_at = None;
                    TraceEvent::CircuitStateChanged {
                        provider: self.name.clone(),
                        from_state: from.label().to_string(),
                        to_state: BreakerState::Closed.label().to_string(),
                    }
                    .emit();
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    TraceEvent::CircuitStateChanged {
                        provider: self.name.clone(),
                        from_state: BreakerState::Closed.label().to_string(),
                        to_state: BreakerState::Open.label().to_string(),
                    }
                    .emit();
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
                TraceEvent::CircuitStateChanged {
                    provider: self.name.clone(),
                    from_state: BreakerState::HalfOpen.label().to_string(),
                    to_state: BreakerState::Open.label().to_string(),
                }
                .emit();
            }
            BreakerState::Open => {}
        }
    }
}

/// Process-wide map from provider/service name to breaker, lazily created
/// on first lookup. A single registry instance is shared by every
/// component that needs breaker-guarded calls; it is constructor-injected
/// rather than a global singleton (spec.md §9 "Global singletons").
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(name) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config)))
            .clone()
    }

    /// Snapshot of every breaker created so far, for health reporting.
    pub fn snapshot(&self) -> HashMap<String, BreakerStats> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.stats()))
            .collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            timeout_secs: 0,
            success_threshold: 2,
        }
    }

    #[test]
    fn monotonic_failure_counting_resets_on_success() {
        let breaker = CircuitBreaker::new("p", test_config());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.stats().failure_count, 2);
        breaker.record_success();
        assert_eq!(breaker.stats().failure_count, 0);
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("p", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.is_request_allowed());
    }

    #[test]
    fn half_open_after_timeout_then_closes_on_successes() {
        let breaker = CircuitBreaker::new("p", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        // timeout_secs = 0, so the very next admission check transitions.
        assert!(breaker.is_request_allowed());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("p", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(breaker.is_request_allowed());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn registry_lazily_creates_and_reuses() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("p1");
        let b = registry.get_or_create("p1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn open_with_nonzero_timeout_does_not_admit_immediately() {
        let config = BreakerConfig {
            failure_threshold: 1,
            timeout_secs: 60,
            success_threshold: 1,
        };
        let breaker = CircuitBreaker::new("p", config);
        breaker.record_failure();
        assert!(!breaker.is_request_allowed());
    }
}
