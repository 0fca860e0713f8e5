//! Leaky bucket with continuous refill.

use tokio::time::{Duration, Instant};

/// A leaky bucket for a single (zone, client) pair.
///
/// Tokens refill continuously at `rate_per_minute / 60` per second up to
/// `burst`. The bucket starts full, allowing an immediate burst. A request
/// that finds no token is rejected outright with the wait hint, never
/// queued or delayed.
pub struct LeakyBucket {
    /// Max tokens (= burst capacity).
    capacity: f32,
    /// Current available tokens.
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    /// Last refill time.
    last_refill: Instant,
    /// Last time any request touched this bucket, for idle eviction.
    last_used: Instant,
}

impl LeakyBucket {
    pub fn new(rate_per_minute: f32, burst: u32) -> Self {
        let now = Instant::now();
        Self {
            capacity: burst as f32,
            tokens: burst as f32,
            refill_rate: rate_per_minute / 60.0,
            last_refill: now,
            last_used: now,
        }
    }

    /// Try to consume one token.
    ///
    /// Returns `Ok(())` if a token was consumed.
    /// Returns `Err(wait_duration)` if the bucket is empty, with the time
    /// until one token becomes available.
    ///
    /// Both outcomes count as use for eviction purposes: a client that keeps
    /// getting rejected still has a hot bucket.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();
        self.last_used = self.last_refill;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            let wait_secs = tokens_needed / self.refill_rate;
            Err(Duration::from_secs_f32(wait_secs))
        }
    }

    /// How long this bucket has been idle as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }

    /// Current token count (after refill). Exposed for tests and status.
    pub fn available(&mut self) -> f32 {
        self.refill();
        self.tokens
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}
