//! Sliding-window rate limiter: prune entries older than `now - window`,
//! allow if the remaining count is under the cap, record the current
//! timestamp. Cleanup prunes keys whose window has gone empty, so a
//! long-lived registry doesn't accumulate one entry per session forever.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

pub struct RateLimiter {
    window: Duration,
    cap: usize,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(cap: usize) -> Self {
        Self { window: DEFAULT_WINDOW, cap, hits: Mutex::new(HashMap::new()) }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Returns `true` and records a hit if `key` is under the cap within
    /// the current window; returns `false` without recording otherwise.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() >= self.cap {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drop any key whose window has emptied out entirely. Call
    /// periodically from the same background loop that flushes traces.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        hits.retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < self.window);
            !entries.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_cap_then_blocks() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn different_keys_have_independent_windows() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn expired_entries_free_up_capacity() {
        let limiter = RateLimiter::new(1).with_window(Duration::from_millis(5));
        assert!(limiter.check("a"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(limiter.check("a"));
    }

    #[test]
    fn cleanup_drops_keys_with_no_live_entries() {
        let limiter = RateLimiter::new(1).with_window(Duration::from_millis(5));
        limiter.check("a");
        std::thread::sleep(Duration::from_millis(10));
        limiter.cleanup();
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
