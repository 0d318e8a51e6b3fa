use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket keyed by caller identity (email), shared across requests.
/// Buckets start full; one token is spent per attempt.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn try_acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn backdate(&self, key: &str, secs: f64) {
        let mut buckets = self.buckets.lock().unwrap();
        if let Some(bucket) = buckets.get_mut(key) {
            bucket.last_refill -= std::time::Duration::from_secs_f64(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_capped_at_capacity() {
        let limiter = RateLimiter::new(3, 0.0);
        assert!(limiter.try_acquire("a@example.com"));
        assert!(limiter.try_acquire("a@example.com"));
        assert!(limiter.try_acquire("a@example.com"));
        assert!(!limiter.try_acquire("a@example.com"));
    }

    #[test]
    fn keys_do_not_share_buckets() {
        let limiter = RateLimiter::new(1, 0.0);
        assert!(limiter.try_acquire("a@example.com"));
        assert!(!limiter.try_acquire("a@example.com"));
        assert!(limiter.try_acquire("b@example.com"));
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(1, 1.0);
        assert!(limiter.try_acquire("a@example.com"));
        assert!(!limiter.try_acquire("a@example.com"));

        limiter.backdate("a@example.com", 2.0);
        assert!(limiter.try_acquire("a@example.com"));
    }
}
