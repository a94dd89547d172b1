use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::events::{ResilienceEvent, ResilienceObserver, TracingObserver};
use crate::{FetchError, UtcDateTime};

/// Runtime circuit state for upstream market data calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<UtcDateTime>,
    trial_in_flight: bool,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Thread-safe circuit breaker shared by every call of one upstream feed.
///
/// Cooldown expiry is checked against the clock when a call arrives; there is
/// no background timer.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn ResilienceObserver>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(TracingObserver))
    }

    pub fn with_parts(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn ResilienceObserver>,
    ) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
            clock,
            observer,
        }
    }

    /// Admits a call or fails fast with [`FetchError::BreakerOpen`].
    ///
    /// Once the cooldown has elapsed the first caller becomes the half-open
    /// trial; everyone else keeps failing fast until the trial settles.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, FetchError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self, false)),
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(FetchError::BreakerOpen {
                        retry_after: Duration::ZERO,
                    });
                }
                inner.trial_in_flight = true;
                Ok(BreakerPermit::new(self, true))
            }
            CircuitState::Open => {
                let now = self.clock.now();
                let elapsed = inner
                    .opened_at
                    .map(|opened_at| now.duration_since(opened_at))
                    .unwrap_or(self.config.open_timeout);

                if elapsed >= self.config.open_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                    inner.trial_in_flight = true;
                    tracing::debug!("circuit breaker cooldown elapsed; admitting trial call");
                    Ok(BreakerPermit::new(self, true))
                } else {
                    Err(FetchError::BreakerOpen {
                        retry_after: self.config.open_timeout - elapsed,
                    })
                }
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        let reset = match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                false
            }
            CircuitState::HalfOpen if trial => {
                *inner = CircuitInner::default();
                true
            }
            CircuitState::HalfOpen | CircuitState::Open => false,
        };
        drop(inner);

        if reset {
            self.observer.on_event(&ResilienceEvent::BreakerReset);
        }
    }

    fn on_failure(&self, trial: bool, cause: &FetchError) {
        let mut inner = self.lock();
        let opened = match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.consecutive_failures >= self.config.failure_threshold
            }
            CircuitState::HalfOpen if trial => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.trial_in_flight = false;
                true
            }
            CircuitState::HalfOpen | CircuitState::Open => false,
        };

        if opened {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(self.clock.now());
        }
        let consecutive_failures = inner.consecutive_failures;
        drop(inner);

        if opened {
            self.observer.on_event(&ResilienceEvent::BreakerOpen {
                consecutive_failures,
                cooldown: self.config.open_timeout,
                cause: cause.to_string(),
            });
        }
    }

    fn release(&self, trial: bool) {
        if trial {
            self.lock().trial_in_flight = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Admission ticket for one guarded call.
///
/// Dropping a permit without recording an outcome is neutral: a cancelled
/// call never counts as a failure and frees the half-open trial slot.
#[must_use = "record the call outcome or drop the permit to release it"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    pub const fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn record_failure(mut self, cause: &FetchError) {
        self.settled = true;
        self.breaker.on_failure(self.trial, cause);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::{EventKind, RecordingObserver};

    struct Harness {
        breaker: CircuitBreaker,
        clock: Arc<ManualClock>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(failure_threshold: u32, open_timeout: Duration) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let observer = Arc::new(RecordingObserver::new());
        let breaker = CircuitBreaker::with_parts(
            CircuitBreakerConfig {
                failure_threshold,
                open_timeout,
            },
            clock.clone(),
            observer.clone(),
        );
        Harness {
            breaker,
            clock,
            observer,
        }
    }

    fn network_failure() -> FetchError {
        FetchError::network("connection refused")
    }

    fn fail_once(breaker: &CircuitBreaker) {
        breaker
            .try_acquire()
            .expect("call should be admitted")
            .record_failure(&network_failure());
    }

    #[test]
    fn opens_after_threshold_failures() {
        let h = harness(2, Duration::from_secs(60));

        assert_eq!(h.breaker.state(), CircuitState::Closed);
        fail_once(&h.breaker);
        assert_eq!(h.breaker.state(), CircuitState::Closed);
        fail_once(&h.breaker);
        assert_eq!(h.breaker.state(), CircuitState::Open);

        let error = h.breaker.try_acquire().expect_err("must fail fast");
        assert_eq!(
            error,
            FetchError::BreakerOpen {
                retry_after: Duration::from_secs(60)
            }
        );
        assert_eq!(h.observer.count(EventKind::BreakerOpen), 1);
    }

    #[test]
    fn success_resets_the_consecutive_counter() {
        let h = harness(3, Duration::from_secs(60));

        fail_once(&h.breaker);
        fail_once(&h.breaker);
        h.breaker.try_acquire().expect("closed").record_success();
        fail_once(&h.breaker);

        assert_eq!(h.breaker.state(), CircuitState::Closed);
        assert_eq!(h.breaker.consecutive_failures(), 1);
    }

    #[test]
    fn transitions_to_half_open_after_timeout_then_closes_on_success() {
        let h = harness(1, Duration::from_secs(300));

        fail_once(&h.breaker);
        assert_eq!(h.breaker.state(), CircuitState::Open);

        h.clock.advance(Duration::from_secs(299));
        assert!(h.breaker.try_acquire().is_err());

        h.clock.advance(Duration::from_secs(1));
        let permit = h.breaker.try_acquire().expect("trial admitted");
        assert!(permit.is_trial());
        assert_eq!(h.breaker.state(), CircuitState::HalfOpen);

        permit.record_success();
        assert_eq!(h.breaker.state(), CircuitState::Closed);
        assert_eq!(h.breaker.consecutive_failures(), 0);
        assert_eq!(h.observer.count(EventKind::BreakerReset), 1);
    }

    #[test]
    fn half_open_failure_restarts_the_cooldown() {
        let h = harness(1, Duration::from_secs(300));

        fail_once(&h.breaker);
        h.clock.advance(Duration::from_secs(300));
        fail_once(&h.breaker);
        assert_eq!(h.breaker.state(), CircuitState::Open);

        h.clock.advance(Duration::from_secs(120));
        let error = h.breaker.try_acquire().expect_err("still cooling down");
        assert_eq!(
            error,
            FetchError::BreakerOpen {
                retry_after: Duration::from_secs(180)
            }
        );
        assert_eq!(h.observer.count(EventKind::BreakerOpen), 2);
    }

    #[test]
    fn only_one_trial_runs_at_a_time() {
        let h = harness(1, Duration::from_secs(1));

        fail_once(&h.breaker);
        h.clock.advance(Duration::from_secs(1));

        let trial = h.breaker.try_acquire().expect("trial admitted");
        assert!(h.breaker.try_acquire().is_err());
        drop(trial);

        let retry = h.breaker.try_acquire().expect("slot released by cancelled trial");
        assert!(retry.is_trial());
    }

    #[test]
    fn dropped_permit_is_not_counted_as_failure() {
        let h = harness(1, Duration::from_secs(60));

        let permit = h.breaker.try_acquire().expect("closed");
        drop(permit);

        assert_eq!(h.breaker.state(), CircuitState::Closed);
        assert_eq!(h.breaker.consecutive_failures(), 0);
    }

    #[test]
    fn concurrent_failures_open_exactly_once() {
        let h = harness(3, Duration::from_secs(60));
        let breaker = &h.breaker;

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(move || {
                    if let Ok(permit) = breaker.try_acquire() {
                        permit.record_failure(&network_failure());
                    }
                });
            }
        });

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(h.observer.count(EventKind::BreakerOpen), 1);
    }
}
