//! Rate limiting implementation using a fixed window per key.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Fixed-window rate limiter for controlling message rates.
///
/// Each key gets a window that opens with its first message; up to
/// `max_messages` are accepted until the window closes, after which the next
/// message opens a fresh one. The limiter is owned by the engine task, so it
/// needs no locking.
#[derive(Debug)]
pub struct RateLimiter<K> {
    windows: HashMap<K, Window>,
    max_messages: u32,
    window: Duration,
    blocked_count: u64,
}

#[derive(Debug, Clone)]
struct Window {
    count: u32,
    resets_at: Instant,
}

impl<K: Hash + Eq> RateLimiter<K> {
    /// Creates a new rate limiter with the specified parameters
    pub fn new(max_messages: u32, window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            max_messages,
            window,
            blocked_count: 0,
        }
    }

    /// Records one message for `key` and reports whether it is allowed
    pub fn check(&mut self, key: K) -> bool {
        let now = Instant::now();
        let window = self.window;
        let entry = self.windows.entry(key).or_insert(Window {
            count: 0,
            resets_at: now + window,
        });

        if now > entry.resets_at {
            entry.count = 0;
            entry.resets_at = now + window;
        }

        if entry.count >= self.max_messages {
            self.blocked_count += 1;
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drops the window for a key, e.g. once its connection is gone
    pub fn forget(&mut self, key: &K) {
        self.windows.remove(key);
    }

    /// Gets the total number of blocked messages
    pub fn blocked_count(&self) -> u64 {
        self.blocked_count
    }

    /// Cleans up windows that closed a while ago
    pub fn cleanup_old_entries(&mut self) {
        let now = Instant::now();
        self.windows.retain(|_, window| window.resets_at >= now);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_allows_within_limit() {
        let mut limiter = RateLimiter::new(10, Duration::from_millis(1000));

        for _ in 0..10 {
            assert!(limiter.check("alice"));
        }

        // The 11th message inside the window is rejected
        assert!(!limiter.check("alice"));
        assert_eq!(limiter.blocked_count(), 1);

        // Other keys are unaffected
        assert!(limiter.check("bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_window_resets() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(1000));

        assert!(limiter.check(7usize));
        assert!(limiter.check(7usize));
        assert!(!limiter.check(7usize));

        tokio::time::advance(Duration::from_millis(1001)).await;

        assert!(limiter.check(7usize));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_and_forget() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(100));
        limiter.check("a");
        limiter.check("b");
        limiter.forget(&"b");
        assert_eq!(limiter.tracked_keys(), 1);

        tokio::time::advance(Duration::from_millis(200)).await;
        limiter.cleanup_old_entries();
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
