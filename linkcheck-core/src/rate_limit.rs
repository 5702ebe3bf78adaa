use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// A cooperative gate on request throughput for one group.
///
/// `acquire` suspends the caller until a credit is available. Implementations
/// must be safe to call repeatedly from a single validator loop and must not
/// leak a credit if the caller is cancelled while waiting (a cancelled
/// `acquire` simply never having consumed one is sufficient; nothing is
/// reserved up front).
#[async_trait]
pub trait RateLimit: Send + Sync {
    async fn acquire(&self);
}

/// Never blocks. The default for groups that don't declare a rate limit.
pub struct NoRateLimit;

#[async_trait]
impl RateLimit for NoRateLimit {
    async fn acquire(&self) {}
}

/// Admits at most `max_requests` in any rolling window of `interval`.
///
/// Implemented as a sliding-window log: each `acquire` prunes timestamps
/// older than `interval`, and either records `now` and returns immediately,
/// or sleeps until the oldest in-window timestamp falls out of the window
/// and retries.
pub struct SlidingWindowRateLimit {
    max_requests: usize,
    interval: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowRateLimit {
    pub fn new(max_requests: usize, interval: Duration) -> Self {
        Self {
            max_requests,
            interval,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }
}

#[async_trait]
impl RateLimit for SlidingWindowRateLimit {
    async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().expect("rate limit mutex poisoned");
                let now = Instant::now();
                while let Some(&oldest) = timestamps.front() {
                    if now.duration_since(oldest) >= self.interval {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }
                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    None
                } else {
                    let oldest = *timestamps.front().expect("non-empty when at capacity");
                    Some(self.interval - now.duration_since(oldest))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

/// `none()` admits requests unconditionally.
pub fn none() -> NoRateLimit {
    NoRateLimit
}

/// `requests_per_time_interval(n, interval)` admits at most `n` requests in
/// any rolling window of width `interval`.
pub fn requests_per_time_interval(max_requests: usize, interval: Duration) -> SlidingWindowRateLimit {
    SlidingWindowRateLimit::new(max_requests, interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn admits_up_to_bound_then_waits() {
        let limit = requests_per_time_interval(2, Duration::from_millis(100));
        let start = Instant::now();

        limit.acquire().await;
        limit.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limit.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn none_never_blocks() {
        let limit = none();
        for _ in 0..1000 {
            limit.acquire().await;
        }
    }
}
