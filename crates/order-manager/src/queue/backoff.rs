//! Retry policy: exponential backoff with additive jitter

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay after the first failure (ms)
    pub initial_backoff_ms: u64,
    /// Upper bound on any delay (ms)
    pub max_backoff_ms: u64,
    /// Growth factor per failed attempt
    pub multiplier: f64,
    /// Up to this fraction of the delay is added at random
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    /// Delay before the attempt following failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let max = self.max_backoff_ms as f64;
        let base = (self.initial_backoff_ms as f64 * self.multiplier.powi(exponent)).min(max);
        let jitter = if self.jitter > 0.0 && base > 0.0 {
            rand::thread_rng().gen_range(0.0..=base * self.jitter)
        } else {
            0.0
        };
        Duration::from_millis((base + jitter).min(max) as u64)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
