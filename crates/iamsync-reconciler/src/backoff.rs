//! Per-declaration retry backoff
//!
//! The host retries failed declarations on later ticks, waiting
//! exponentially longer after each consecutive failure.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::BackoffConfig;

#[derive(Debug, Clone)]
struct RetryState {
    failures: u32,
    not_before: Instant,
}

/// Tracks consecutive failures and the earliest next attempt per key
#[derive(Debug)]
pub struct RetryTracker {
    config: BackoffConfig,
    states: HashMap<String, RetryState>,
}

impl RetryTracker {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Delay after `failures` consecutive failures
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(failures - 1);
        let ms = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Whether `key` may be attempted at `now`
    pub fn is_due(&self, key: &str, now: Instant) -> bool {
        self.states.get(key).map_or(true, |s| now >= s.not_before)
    }

    /// Record a failure at `now`, returning the delay before the next attempt
    pub fn record_failure(&mut self, key: &str, now: Instant) -> Duration {
        let failures = self.states.get(key).map_or(0, |s| s.failures) + 1;
        let delay = self.delay_for(failures);
        self.states.insert(
            key.to_string(),
            RetryState {
                failures,
                not_before: now + delay,
            },
        );
        delay
    }

    /// Record a failure that retrying cannot fix, deferring the next attempt
    /// by the maximum delay
    pub fn record_permanent_failure(&mut self, key: &str, now: Instant) -> Duration {
        let failures = self.failure_count(key) + 1;
        let delay = Duration::from_millis(self.config.max_delay_ms);
        self.states.insert(
            key.to_string(),
            RetryState {
                failures,
                not_before: now + delay,
            },
        );
        delay
    }

    pub fn record_success(&mut self, key: &str) {
        self.forget(key);
    }

    pub fn forget(&mut self, key: &str) {
        self.states.remove(key);
    }

    pub fn failure_count(&self, key: &str) -> u32 {
        self.states.get(key).map_or(0, |s| s.failures)
    }
}
