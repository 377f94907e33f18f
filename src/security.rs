/// Login throttling
///
/// Every login runs a bcrypt comparison, so an unthrottled login endpoint is
/// an easy way to burn CPU. Each client address gets a token bucket that
/// refills at `login_attempts_per_minute`. Callers key buckets on the TCP
/// peer address, never on client-supplied forwarding headers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::configuration::SecuritySettings;
use crate::error::AppError;

/// Upper bound on tracked clients.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// A bucket untouched this long has refilled completely.
const IDLE_AFTER: Duration = Duration::from_secs(60);

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
        }
    }

    fn refill(&mut self, capacity: u32, refill_rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(f64::from(capacity));
        self.last_refill = now;
    }

    fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct LoginThrottle {
    capacity: u32,
    refill_rate: f64, // tokens per second
    max_clients: usize,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl LoginThrottle {
    pub fn new(attempts_per_minute: u32) -> Self {
        Self {
            capacity: attempts_per_minute,
            refill_rate: f64::from(attempts_per_minute) / 60.0,
            max_clients: MAX_TRACKED_CLIENTS,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &SecuritySettings) -> Self {
        Self::new(settings.login_attempts_per_minute)
    }

    /// Consume one attempt for `client`.
    ///
    /// # Errors
    /// `AppError::RateLimited` when the client's bucket is empty
    pub fn check(&self, client: &str) -> Result<(), AppError> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), AppError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| AppError::Internal("login throttle lock poisoned".to_string()))?;

        if buckets.len() >= self.max_clients && !buckets.contains_key(client) {
            self.evict(&mut buckets, now);
        }

        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.refill(self.capacity, self.refill_rate, now);

        if bucket.try_take() {
            Ok(())
        } else {
            tracing::warn!(client = %client, "Login rate limit exceeded");
            Err(AppError::RateLimited)
        }
    }

    /// Drop idle buckets; if that frees too little, drop the least recently
    /// used tenth as well. Leaves the map at most 90% full.
    fn evict(&self, buckets: &mut HashMap<String, TokenBucket>, now: Instant) {
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < IDLE_AFTER);

        let target = self.max_clients.saturating_sub(self.max_clients / 10 + 1);
        if buckets.len() > target {
            let mut last_seen: Vec<Instant> = buckets.values().map(|b| b.last_refill).collect();
            let excess = buckets.len() - target;
            let (_, cutoff, _) = last_seen.select_nth_unstable(excess - 1);
            let cutoff = *cutoff;

            let mut to_drop = excess;
            buckets.retain(|_, bucket| {
                if to_drop > 0 && bucket.last_refill <= cutoff {
                    to_drop -= 1;
                    false
                } else {
                    true
                }
            });
        }

        tracing::debug!(tracked = buckets.len(), "Evicted login throttle buckets");
    }
}
