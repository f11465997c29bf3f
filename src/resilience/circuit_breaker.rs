//! Circuit breaker for target protection.
//!
//! # States
//! - Closed: calls are attempted
//! - Open: calls fail fast with `NotAllowed`
//!
//! # State Transitions
//! ```text
//! Closed → Open: samples >= min_samples AND failures / samples >= failure_ratio
//! Open → Closed: old failures leave the window (by count or by age)
//! ```
//!
//! # Design Decisions
//! - The state is derived from a rolling window, never stored as a timer
//! - Rejected calls are not recorded, so an open breaker recovers as its
//!   failures age out
//! - Cancelled and deadline-exceeded calls are never recorded

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::NotAllowed;
use crate::observability::metrics;

/// Breaker state at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
}

/// Trailing window of call outcomes, bounded by count and by age.
#[derive(Debug, Default)]
struct Window {
    samples: VecDeque<(Instant, bool)>,
    failures: usize,
    open: bool,
}

impl Window {
    fn evict(&mut self, now: Instant, max_age: Duration, max_len: usize) {
        while let Some((at, _)) = self.samples.front() {
            if now.saturating_duration_since(*at) < max_age && self.samples.len() <= max_len {
                break;
            }
            if let Some((_, success)) = self.samples.pop_front() {
                if !success {
                    self.failures -= 1;
                }
            }
        }
    }

    fn push(&mut self, now: Instant, success: bool) {
        self.samples.push_back((now, success));
        if !success {
            self.failures += 1;
        }
    }

    fn successes(&self) -> usize {
        self.samples.len() - self.failures
    }
}

/// Failure-ratio circuit breaker for one target.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    window: Mutex<Window>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            window: Mutex::new(Window::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admission check, consulted before a connection is picked.
    pub fn allow(&self) -> Result<(), NotAllowed> {
        let mut window = self.window.lock();
        if self.evaluate(&mut window, Instant::now()) {
            Err(NotAllowed {
                target: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }

    pub fn mark_success(&self) {
        self.record(true);
    }

    pub fn mark_failed(&self) {
        self.record(false);
    }

    pub fn state(&self) -> BreakerState {
        let mut window = self.window.lock();
        if self.evaluate(&mut window, Instant::now()) {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }

    /// `(successes, failures)` currently in the window.
    pub fn counts(&self) -> (usize, usize) {
        let mut window = self.window.lock();
        window.evict(Instant::now(), self.max_age(), self.config.window_size);
        (window.successes(), window.failures)
    }

    fn record(&self, success: bool) {
        let now = Instant::now();
        let mut window = self.window.lock();
        window.push(now, success);
        self.evaluate(&mut window, now);
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    /// Expire old samples and recompute the state. Returns true when open.
    fn evaluate(&self, window: &mut Window, now: Instant) -> bool {
        window.evict(now, self.max_age(), self.config.window_size);

        let samples = window.samples.len();
        let open = samples >= self.config.min_samples
            && samples > 0
            && window.failures as f64 / samples as f64 >= self.config.failure_ratio;

        if open != window.open {
            window.open = open;
            metrics::record_breaker_state(&self.name, open);
            if open {
                tracing::warn!(
                    breaker = %self.name,
                    failures = window.failures,
                    samples,
                    "Circuit breaker opened"
                );
            } else {
                tracing::info!(breaker = %self.name, samples, "Circuit breaker closed");
            }
        }
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn config() -> BreakerConfig {
        BreakerConfig {
            window_size: 100,
            window_secs: 10,
            failure_ratio: 0.5,
            min_samples: 10,
            per_method: false,
        }
    }

    #[test]
    fn test_sparse_traffic_does_not_trip() {
        let cb = CircuitBreaker::new("comment", config());
        for _ in 0..4 {
            cb.mark_failed();
        }
        cb.mark_success();
        assert_eq!(cb.counts(), (1, 4));
        assert!(cb.allow().is_ok());
    }

    #[test]
    fn test_trips_on_failure_ratio() {
        let cb = CircuitBreaker::new("comment", config());
        for _ in 0..40 {
            cb.mark_success();
        }
        for _ in 0..60 {
            cb.mark_failed();
        }
        assert_eq!(cb.state(), BreakerState::Open);
        let err = cb.allow().unwrap_err();
        assert_eq!(err.target, "comment");
    }

    #[test]
    fn test_recovers_as_window_slides() {
        let cb = CircuitBreaker::new("comment", config());
        for _ in 0..40 {
            cb.mark_success();
        }
        for _ in 0..60 {
            cb.mark_failed();
        }
        assert!(cb.allow().is_err());

        let mut fed = 0;
        while cb.allow().is_err() {
            cb.mark_success();
            fed += 1;
            assert!(fed <= 100, "breaker never closed");
        }
        // The oldest 40 successes leave first, then failures age out one by one.
        assert_eq!(fed, 51);
        assert_eq!(cb.counts(), (51, 49));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let cb = CircuitBreaker::new("comment", config());
        for _ in 0..5 {
            cb.mark_success();
            cb.mark_failed();
        }
        assert_eq!(cb.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_expire_with_time() {
        let cb = CircuitBreaker::new("comment", config());
        for _ in 0..20 {
            cb.mark_failed();
        }
        assert!(cb.allow().is_err());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cb.allow().is_ok());
        assert_eq!(cb.counts(), (0, 0));
    }

    #[test]
    fn test_concurrent_marks() {
        let mut cfg = config();
        cfg.window_size = 10_000;
        let cb = Arc::new(CircuitBreaker::new("comment", cfg));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cb = cb.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            cb.mark_success();
                        } else {
                            cb.mark_failed();
                        }
                        let _ = cb.allow();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cb.counts(), (400, 400));
        assert_eq!(cb.state(), BreakerState::Open);
    }
}
