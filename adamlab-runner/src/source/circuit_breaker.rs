//! Circuit breaker for the price provider.
//!
//! A 403 trips it immediately; three consecutive failures (429s, 5xx) trip it
//! too. While open every request is refused until the cooldown has elapsed.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open { since: Instant },
}

#[derive(Debug)]
struct Inner {
    state: State,
    failures: u32,
}

/// Shared by every fetch in a batch through an `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                failures: 0,
            }),
            cooldown,
            threshold: threshold.max(1),
        }
    }

    /// 30 minute cooldown, three strikes.
    pub fn for_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    // A panic while holding the lock leaves the counters usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            State::Closed => true,
            State::Open { since } if since.elapsed() >= self.cooldown => {
                inner.state = State::Closed;
                inner.failures = 0;
                true
            }
            State::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        if inner.failures >= self.threshold {
            inner.state = State::Open {
                since: Instant::now(),
            };
        }
    }

    /// Open the breaker now (IP ban).
    pub fn trip(&self) {
        self.lock().state = State::Open {
            since: Instant::now(),
        };
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().state {
            State::Closed => Duration::ZERO,
            State::Open { since } => self.cooldown.saturating_sub(since.elapsed()),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::for_provider()
    }
}
