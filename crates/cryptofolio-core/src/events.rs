//! Structured resilience events.
//!
//! Retry and breaker transitions are reported to an injected
//! [`ResilienceObserver`] instead of being printed. [`TracingObserver`] is the
//! default and forwards every event to `tracing`.

use std::fmt::{Debug, Display, Formatter};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Event category, stable for log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Retry,
    BreakerOpen,
    BreakerReset,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::BreakerOpen => "breaker_open",
            Self::BreakerReset => "breaker_reset",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResilienceEvent {
    /// A failed attempt is about to be retried after `delay`.
    Retry {
        attempt: u32,
        delay: Duration,
        cause: String,
    },
    /// The breaker tripped and will reject calls for `cooldown`.
    BreakerOpen {
        consecutive_failures: u32,
        cooldown: Duration,
        cause: String,
    },
    /// A trial call succeeded and the breaker closed again.
    BreakerReset,
}

impl ResilienceEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Retry { .. } => EventKind::Retry,
            Self::BreakerOpen { .. } => EventKind::BreakerOpen,
            Self::BreakerReset => EventKind::BreakerReset,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Self::Retry {
                attempt,
                delay,
                cause,
            } => format!(
                "retry {attempt} after {}s due to: {cause}",
                delay.as_secs_f64()
            ),
            Self::BreakerOpen {
                consecutive_failures,
                cooldown,
                cause,
            } => format!(
                "breaker opened after {consecutive_failures} consecutive failures for {}s: {cause}",
                cooldown.as_secs()
            ),
            Self::BreakerReset => String::from("breaker closed after successful trial call"),
        }
    }
}

pub trait ResilienceObserver: Send + Sync + Debug {
    fn on_event(&self, event: &ResilienceEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResilienceObserver for TracingObserver {
    fn on_event(&self, event: &ResilienceEvent) {
        match event {
            ResilienceEvent::Retry {
                attempt,
                delay,
                cause,
            } => tracing::warn!(
                kind = %event.kind(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                cause = %cause,
                "retrying upstream request"
            ),
            ResilienceEvent::BreakerOpen {
                consecutive_failures,
                cooldown,
                cause,
            } => tracing::warn!(
                kind = %event.kind(),
                consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                cause = %cause,
                "market data circuit breaker opened"
            ),
            ResilienceEvent::BreakerReset => tracing::info!(
                kind = %event.kind(),
                "market data circuit breaker reset"
            ),
        }
    }
}

/// Keeps every event in memory; handy for assertions and diagnostics output.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ResilienceEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResilienceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }
}

impl ResilienceObserver for RecordingObserver {
    fn on_event(&self, event: &ResilienceEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_detail_names_attempt_delay_and_cause() {
        let event = ResilienceEvent::Retry {
            attempt: 2,
            delay: Duration::from_secs(9),
            cause: String::from("upstream returned status 503: busy"),
        };
        assert_eq!(event.kind(), EventKind::Retry);
        assert_eq!(
            event.detail(),
            "retry 2 after 9s due to: upstream returned status 503: busy"
        );
    }

    #[test]
    fn recording_observer_counts_by_kind() {
        let observer = RecordingObserver::new();
        observer.on_event(&ResilienceEvent::BreakerReset);
        observer.on_event(&ResilienceEvent::BreakerReset);
        observer.on_event(&ResilienceEvent::Retry {
            attempt: 1,
            delay: Duration::from_secs(3),
            cause: String::from("timeout"),
        });

        assert_eq!(observer.count(EventKind::BreakerReset), 2);
        assert_eq!(observer.count(EventKind::Retry), 1);
        assert_eq!(observer.events().len(), 3);
    }
}
