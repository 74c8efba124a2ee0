//! Classification dispatch
//!
//! Selects between the primary (remote) and fallback (keyword) paths per
//! request. Every primary failure is recovered locally, so the dispatcher
//! returns a classification for any well-formed input; only a failure of
//! the fallback path itself propagates.
//!
//! A process-wide circuit breaker tracks consecutive primary failures.
//! After the threshold is reached the primary path is skipped outright
//! until a cooldown elapses; the first call after the deadline is the
//! half-open probe, and its outcome decides whether the circuit closes
//! again or re-opens. State is a pair of atomics plus a probe flag, shared
//! freely between concurrent classification calls.

use crate::classifier::Classifier;
use crate::keyword::KeywordClassifier;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use triage_core::{clamp_confidence, Classification, Result};

/// Circuit breaker tuning
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// How long the primary path stays skipped once open
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Breaker state derived from the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Primary path is attempted normally
    Closed,
    /// Primary path is skipped until the cooldown deadline
    Open,
    /// Cooldown elapsed; one trial call is allowed through
    HalfOpen,
}

/// Lock-free consecutive-failure circuit breaker.
///
/// Timestamps are milliseconds from a fixed process anchor `Instant`, so
/// deadline comparisons are monotonic and wall-clock adjustments cannot
/// re-open or wedge the circuit.
pub struct CircuitBreaker {
    config: BreakerConfig,
    anchor: Instant,
    consecutive_failures: AtomicU32,
    open_until_ms: AtomicU64,
    probe_in_flight: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            anchor: Instant::now(),
            consecutive_failures: AtomicU32::new(0),
            open_until_ms: AtomicU64::new(0),
            probe_in_flight: AtomicBool::new(false),
        }
    }

    fn now_ms(&self) -> u64 {
        self.anchor.elapsed().as_millis() as u64
    }

    /// Current state, for logging and tests
    pub fn state(&self) -> BreakerState {
        if self.consecutive_failures.load(Ordering::Acquire) < self.config.failure_threshold {
            BreakerState::Closed
        } else if self.now_ms() < self.open_until_ms.load(Ordering::Acquire) {
            BreakerState::Open
        } else {
            BreakerState::HalfOpen
        }
    }

    /// Whether the caller may attempt the primary path.
    ///
    /// While half-open, only the caller that wins the probe flag gets
    /// through; concurrent callers fall back without stampeding the
    /// backend.
    pub fn should_attempt(&self) -> bool {
        match self.state() {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => self
                .probe_in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
        }
    }

    /// Record a successful primary call
    pub fn record_success(&self) {
        self.probe_in_flight.store(false, Ordering::Release);
        let failures = self.consecutive_failures.swap(0, Ordering::AcqRel);
        if failures >= self.config.failure_threshold {
            info!("circuit closed after successful probe");
            metrics::counter!("triage_breaker_transitions_total", "to" => "closed").increment(1);
        }
    }

    /// Record a failed primary call
    pub fn record_failure(&self) {
        let was_probe = self.probe_in_flight.swap(false, Ordering::AcqRel);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;

        if was_probe || failures >= self.config.failure_threshold {
            let deadline = self.now_ms() + self.config.cooldown.as_millis() as u64;
            self.open_until_ms.store(deadline, Ordering::Release);

            if was_probe || failures == self.config.failure_threshold {
                warn!(
                    consecutive_failures = failures,
                    cooldown_ms = self.config.cooldown.as_millis() as u64,
                    "circuit opened, primary classification path suspended"
                );
                metrics::counter!("triage_breaker_transitions_total", "to" => "open").increment(1);
            }
        }
    }
}

/// Primary/fallback classification dispatcher
pub struct ClassifierDispatcher {
    primary: Option<Arc<dyn Classifier>>,
    fallback: KeywordClassifier,
    breaker: CircuitBreaker,
}

impl ClassifierDispatcher {
    /// Create a dispatcher with a primary engine and breaker tuning
    pub fn new(
        primary: Arc<dyn Classifier>,
        fallback: KeywordClassifier,
        breaker: BreakerConfig,
    ) -> Self {
        Self {
            primary: Some(primary),
            fallback,
            breaker: CircuitBreaker::new(breaker),
        }
    }

    /// Create a dispatcher that only ever uses the keyword path, for
    /// deployments without a configured backend
    pub fn fallback_only(fallback: KeywordClassifier) -> Self {
        Self {
            primary: None,
            fallback,
            breaker: CircuitBreaker::new(BreakerConfig::default()),
        }
    }

    /// Breaker state, for observability endpoints and tests
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Classify ticket text.
    ///
    /// Always produces a classification for non-empty input: primary-path
    /// failures are absorbed by the keyword fallback. A fallback failure
    /// is a defect and propagates.
    pub async fn classify(&self, text: &str) -> Result<Classification> {
        let start = Instant::now();

        if let Some(primary) = &self.primary {
            if self.breaker.should_attempt() {
                match primary.classify(text).await {
                    Ok(mut result) => {
                        self.breaker.record_success();
                        result.confidence_score = clamp_confidence(result.confidence_score);
                        result.processing_time_ms = start.elapsed().as_millis() as u64;
                        metrics::counter!("triage_classifications_total", "engine" => "remote")
                            .increment(1);
                        metrics::histogram!("triage_classification_latency_ms")
                            .record(result.processing_time_ms as f64);
                        return Ok(result);
                    }
                    Err(err) => {
                        self.breaker.record_failure();
                        warn!(error = %err, "primary classification failed, using keyword fallback");
                        metrics::counter!("triage_fallbacks_total", "reason" => "primary_error")
                            .increment(1);
                    }
                }
            } else {
                debug!("circuit open, skipping primary classification path");
                metrics::counter!("triage_fallbacks_total", "reason" => "circuit_open")
                    .increment(1);
            }
        }

        let result = self.fallback.classify(text).await?;
        let result = result.with_processing_time(start.elapsed().as_millis() as u64);
        metrics::counter!("triage_classifications_total", "engine" => "keyword").increment(1);
        metrics::histogram!("triage_classification_latency_ms")
            .record(result.processing_time_ms as f64);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown,
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = breaker(3, Duration::from_secs(60));

        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.should_attempt());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_attempt());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = breaker(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_allows_single_probe() {
        let breaker = breaker(1, Duration::from_millis(10));

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        // First caller claims the probe; concurrent callers are refused.
        assert!(breaker.should_attempt());
        assert!(!breaker.should_attempt());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn failed_probe_reopens() {
        let breaker = breaker(1, Duration::from_millis(10));

        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.should_attempt());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_attempt());
    }
}
