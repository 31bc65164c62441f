//! Reconnection backoff.

use std::time::Duration;

/// Initial backoff duration between reconnection attempts.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum backoff duration between reconnection attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bounds of the exponential backoff applied between reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: INITIAL_BACKOFF,
            max: MAX_BACKOFF,
        }
    }
}

/// Doubling delay, capped at the policy maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.initial,
        }
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.policy.max);
        delay
    }

    /// Resets to the initial delay after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }

    /// Replaces the base delay, as requested by an SSE `retry:` field.
    pub fn set_initial(&mut self, initial: Duration) {
        self.policy.initial = initial.min(self.policy.max);
        self.current = self.policy.initial;
    }
}
