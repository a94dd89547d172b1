//! Bounded retries with exponential backoff and optional jitter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::events::{ResilienceEvent, ResilienceObserver, TracingObserver};
use crate::http_client::HttpResponse;
use crate::FetchError;

/// Exponential delay `base * factor^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
    /// Spread each delay uniformly over +/- 50%.
    pub jitter: bool,
}

impl Default for Backoff {
    /// 3s before the first retry, 9s before the second.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3),
            factor: 3.0,
            max: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay for the 0-based retry `n`.
    pub fn delay(self, n: u32) -> Duration {
        let exponent = i32::try_from(n).unwrap_or(i32::MAX);
        let seconds = (self.base.as_secs_f64() * self.factor.powi(exponent))
            .min(self.max.as_secs_f64());
        let delay = Duration::from_secs_f64(seconds);

        if !self.jitter {
            return delay;
        }
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let spread = millis / 2;
        Duration::from_millis(millis - spread + fastrand::u64(0..=spread * 2))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Responses with a status at or above this value are retried.
    pub min_retry_status: u16,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
            min_retry_status: 400,
        }
    }
}

impl RetryConfig {
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        status >= self.min_retry_status
    }

    /// Transport failures and failing statuses are retried; everything else is terminal.
    pub fn should_retry_error(&self, error: &FetchError) -> bool {
        match error {
            FetchError::Timeout { .. } | FetchError::Network { .. } => true,
            FetchError::Upstream { status, .. } => self.should_retry_status(*status),
            FetchError::BreakerOpen { .. }
            | FetchError::Decode { .. }
            | FetchError::InvalidRequest { .. } => false,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        self.backoff.delay(retry.saturating_sub(1))
    }
}

/// Executes an upstream attempt under [`RetryConfig`], reporting each retry to an observer.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    observer: Arc<dyn ResilienceObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: RetryConfig, observer: Arc<dyn ResilienceObserver>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. Failing statuses come back as
    /// [`FetchError::Upstream`]; the last failure is returned.
    pub async fn execute<F, Fut>(&self, mut operation: F) -> Result<HttpResponse, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<HttpResponse, FetchError>>,
    {
        let total_attempts = self.config.total_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match operation(attempt).await {
                Ok(response) if !response.is_failure() => return Ok(response),
                Ok(response) => FetchError::upstream(response.status, &response.body),
                Err(error) => error,
            };

            if !self.config.should_retry_error(&failure) || attempt >= total_attempts {
                return Err(failure);
            }

            let delay = self.config.delay_before_retry(attempt);
            self.observer.on_event(&ResilienceEvent::Retry {
                attempt,
                delay,
                cause: failure.to_string(),
            });
            tokio::time::sleep(delay).await;
        }
    }
}
