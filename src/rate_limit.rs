//! # Rate Limiter Module
//!
//! Per-user fixed-window message limiter. Keeps one counter per user and
//! resets it when the window has elapsed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Limits how many messages each user may send per window
#[derive(Debug)]
pub struct RateLimiter {
    max_messages: u32,
    window: Duration,
    counters: Mutex<HashMap<i64, (Instant, u32)>>,
}

impl RateLimiter {
    /// `max_messages` per minute; zero disables limiting
    pub fn per_minute(max_messages: u32) -> Self {
        Self::new(max_messages, Duration::from_secs(60))
    }

    pub fn new(max_messages: u32, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Record one message from `user_id` and report whether it may proceed
    pub fn check(&self, user_id: i64) -> bool {
        if self.max_messages == 0 {
            return true;
        }

        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());

        // Forget windows that ended long ago so the map does not grow forever
        if counters.len() > 10_000 {
            counters.retain(|_, (start, _)| now.duration_since(*start) < self.window);
        }

        let entry = counters.entry(user_id).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }

        if entry.1 >= self.max_messages {
            return false;
        }
        entry.1 += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_limit_resets_after_window() {
        let limiter = RateLimiter::per_minute(2);

        assert!(limiter.check(1));
        assert!(limiter.check(1));
        assert!(!limiter.check(1));
        // Other users are unaffected
        assert!(limiter.check(2));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.check(1));
    }

    #[test]
    fn test_zero_disables_limit() {
        let limiter = RateLimiter::per_minute(0);
        assert!((0..1000).all(|_| limiter.check(1)));
    }
}
