//! Client-side token bucket for the HTTP presence fallback.

use std::sync::Mutex;

use tokio::time::Instant;

/// Burst size.
pub const CAPACITY: f64 = 4.0;

/// Tokens regained per second: 4 every 25 s, one every 6.25 s.
pub const REFILL_PER_SECOND: f64 = 4.0 / 25.0;

/// Token bucket state. `0 <= tokens <= capacity` always holds.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    pub capacity: f64,
    pub tokens: f64,
    pub refill_per_second: f64,
    pub last_refill: Instant,
}

impl TokenBucket {
    /// Full bucket.
    pub fn new(capacity: f64, refill_per_second: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_second,
            last_refill: now,
        }
    }

    /// Refill for the time passed since the last call, then take one token
    /// if there is one. A denied call leaves the refilled balance in place.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

/// Shared admission control; every caller goes through one lock.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// 4-token burst, one token every 6.25 s. Stricter than the server's own
    /// limits so the fallback never trips them.
    pub fn new() -> Self {
        Self::with_rate(CAPACITY, REFILL_PER_SECOND)
    }

    pub fn with_rate(capacity: f64, refill_per_second: f64) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(capacity, refill_per_second, Instant::now())),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        self.bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .try_acquire_at(now)
    }

    /// Current balance, for diagnostics.
    pub fn available(&self) -> f64 {
        self.bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
