//! Token bucket throttle for the dispatch loop
//!
//! Tokens refill continuously at `rate_per_sec` up to `burst`. Waiting for a
//! token sleeps until the deficit is covered; it never spins.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Sustained dispatch rate
    pub rate_per_sec: f64,
    /// Bucket capacity (dispatches allowed back to back)
    pub burst: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 10.0,
            burst: 20,
        }
    }
}

pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    /// Starts full
    pub fn new(config: &ThrottleConfig) -> Self {
        let capacity = config.burst as f64;
        Self {
            capacity,
            refill_rate: config.rate_per_sec,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_update: Instant::now(),
            }),
        }
    }

    /// Take a token now, or report how long until one is due
    pub fn try_consume(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_rate))
        }
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        loop {
            match self.try_consume() {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Return a token that was taken but not used
    pub fn refund(&self) {
        let mut state = self.state.lock();
        state.tokens = (state.tokens + 1.0).min(self.capacity);
    }

    /// Tokens currently available (after refill)
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(rate: f64, burst: u32) -> TokenBucket {
        TokenBucket::new(&ThrottleConfig {
            rate_per_sec: rate,
            burst,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_wait() {
        let bucket = bucket(10.0, 3);
        for _ in 0..3 {
            assert!(bucket.try_consume().is_ok());
        }
        let wait = bucket.try_consume().unwrap_err();
        assert!(wait <= Duration::from_millis(100));
        assert!(wait >= Duration::from_millis(99));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(bucket.try_consume().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_sleeps_for_next_token() {
        let bucket = bucket(10.0, 1);
        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(199));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refund_is_capped() {
        let bucket = bucket(10.0, 2);
        bucket.refund();
        assert!(bucket.available() <= 2.0);

        bucket.try_consume().unwrap();
        bucket.refund();
        assert_eq!(bucket.available(), 2.0);
    }
}
