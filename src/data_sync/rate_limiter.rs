use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Sliding-window limiter for locally originated requests.
///
/// Keeps the timestamps of the requests inside the current window; a request
/// is admitted only while fewer than `max_requests` remain in the window.
/// Owned by a single caller — the monitor loop mutates it sequentially, the
/// executor wraps its own instance in a mutex.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: VecDeque::with_capacity(max_requests),
        }
    }

    /// Limiter with the provider-friendly default of 15 requests per second.
    pub fn new_default() -> Self {
        Self::new(15, Duration::from_secs(1))
    }

    /// Admit a request if the window has room. Does not wait.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Wait until the window frees a slot, then record the request.
    pub async fn acquire(&mut self) {
        loop {
            let now = Instant::now();
            self.prune(now);
            if self.timestamps.len() < self.max_requests {
                self.timestamps.push_back(now);
                return;
            }
            // Oldest entry leaving the window frees the next slot.
            let free_at = self.timestamps[0] + self.window;
            debug!(
                wait_ms = free_at.saturating_duration_since(now).as_millis() as u64,
                "rate limit reached, waiting"
            );
            sleep_until(free_at).await;
        }
    }

    fn try_acquire_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.timestamps.len() >= self.max_requests {
            return false;
        }
        self.timestamps.push_back(now);
        true
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_within_one_window() {
        let mut limiter = RateLimiter::new(15, Duration::from_secs(1));
        let now = Instant::now();

        for _ in 0..15 {
            assert!(limiter.try_acquire_at(now));
        }
        assert!(!limiter.try_acquire_at(now));
    }

    #[test]
    fn window_slides_as_time_passes() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();

        assert!(limiter.try_acquire_at(start));
        assert!(limiter.try_acquire_at(start));
        assert!(!limiter.try_acquire_at(start + Duration::from_millis(500)));

        // Both earlier requests fall out of the window.
        assert!(limiter.try_acquire_at(start + Duration::from_millis(1_001)));
        assert!(limiter.try_acquire_at(start + Duration::from_millis(1_001)));
        assert!(!limiter.try_acquire_at(start + Duration::from_millis(1_001)));
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_out_a_full_window() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1));

        limiter.acquire().await;
        let before = Instant::now();
        limiter.acquire().await;
        assert!(before.elapsed() >= Duration::from_millis(900));
    }
}
