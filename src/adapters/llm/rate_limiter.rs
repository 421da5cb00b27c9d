//! Token bucket rate limiter for provider requests.

use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Token bucket rate limiter.
///
/// Tokens refill continuously based on elapsed time; `acquire` waits
/// until at least one token is available, then consumes it. Capacity
/// equals the refill rate, so bursts are bounded to one second's worth
/// of requests.
pub struct TokenBucketRateLimiter {
    inner: Mutex<Bucket>,
    capacity: f64,
    refill_rate: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// Create a limiter allowing `requests_per_second` sustained requests.
    pub fn new(requests_per_second: f64) -> Self {
        let rps = if requests_per_second > 0.0 {
            requests_per_second
        } else {
            1.0
        };
        Self {
            inner: Mutex::new(Bucket {
                tokens: rps,
                last_refill: Instant::now(),
            }),
            capacity: rps,
            refill_rate: rps,
        }
    }

    /// Acquire a token, waiting if necessary.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.inner.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                // Time until one full token is available.
                (1.0 - bucket.tokens) / self.refill_rate
            };
            sleep(Duration::from_secs_f64(wait.min(1.0))).await;
        }
    }
}
