use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 100, // Reddit allows 100 requests per minute for OAuth2
            time_window: Duration::from_secs(60),
            burst_allowance: 10,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Takes tokens, or returns how long until enough have refilled.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    pub async fn drain(&self) {
        let mut state = self.state.lock().await;
        state.tokens = 0.0;
        state.last_refill = Instant::now();
    }
}

/// Client-side limiter in front of every Reddit API call. Also honours the
/// `x-ratelimit-*` budget Reddit reports back.
#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    resume_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            token_bucket: TokenBucket::new(&config),
            resume_at: Mutex::new(None),
        }
    }

    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();

        let pause = self.resume_at.lock().await.take();
        if let Some(resume_at) = pause {
            let now = Instant::now();
            if resume_at > now {
                tracing::info!(
                    "Reddit request budget exhausted, pausing for {:?}",
                    resume_at - now
                );
                sleep(resume_at - now).await;
            }
        }

        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }

        RateLimitPermit {
            queue_wait_time: start_time.elapsed(),
        }
    }

    /// Records the server-reported budget. When it is used up the next permit
    /// waits until the reported reset.
    pub async fn observe_server_budget(&self, remaining: f64, reset_after: Duration) {
        if remaining < 1.0 {
            *self.resume_at.lock().await = Some(Instant::now() + reset_after);
            self.token_bucket.drain().await;
        }
    }

    pub async fn available_tokens(&self) -> u32 {
        self.token_bucket.available_tokens().await as u32
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    pub queue_wait_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_token_bucket_basic() {
        let config = RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(10),
            burst_allowance: 5,
        };

        let bucket = TokenBucket::new(&config);

        // Should be able to acquire up to burst allowance
        for _ in 0..5 {
            assert!(bucket.acquire(1.0).await.is_ok());
        }

        // Next acquisition should fail
        assert!(bucket.acquire(1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let config = RateLimitConfig {
            max_requests: 60, // 1 token per second
            time_window: Duration::from_secs(60),
            burst_allowance: 2,
        };

        let bucket = TokenBucket::new(&config);

        assert!(bucket.acquire(2.0).await.is_ok());
        assert!(bucket.acquire(1.0).await.is_err());

        sleep(Duration::from_millis(1100)).await;

        assert!(bucket.acquire(1.0).await.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_hands_out_permits() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        let _permit1 = limiter.acquire_permit().await;
        let permit2 = limiter.acquire_permit().await;

        assert!(permit2.queue_wait_time < Duration::from_secs(1));
        assert!(limiter.available_tokens().await <= 8);
    }

    #[tokio::test]
    async fn test_exhausted_server_budget_pauses_next_permit() {
        let config = RateLimitConfig {
            max_requests: 6000,
            time_window: Duration::from_secs(60),
            burst_allowance: 5,
        };
        let limiter = RateLimiter::new(config);

        limiter
            .observe_server_budget(0.0, Duration::from_millis(300))
            .await;
        let permit = limiter.acquire_permit().await;
        assert!(permit.queue_wait_time >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_remaining_server_budget_does_not_pause() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        limiter
            .observe_server_budget(42.0, Duration::from_secs(30))
            .await;
        let permit = limiter.acquire_permit().await;
        assert!(permit.queue_wait_time < Duration::from_secs(1));
    }
}
