//! Fixed-window rate limiting per client key.
//!
//! Windows are wall-clock based, so a burst straddling a window boundary can
//! admit up to `2 * max` requests in a short span. That is accepted.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use crate::config::RateLimitConfig;

// Rate limit entry - tracks requests per IP/key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

pub struct RateLimiter {
    windows: DashMap<String, RateLimitEntry>,
    max: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max: config.max,
            window: config.window,
        }
    }

    pub fn admit(&self, client_key: &str) -> bool {
        self.admit_at(client_key, Instant::now())
    }

    pub fn admit_at(&self, client_key: &str, now: Instant) -> bool {
        // entry() holds the shard write lock for the whole read-modify-write
        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        //windows expired..? Reset it
        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.count = 1;
            entry.window_start = now;
            return true;
        }

        // under limit.? Allow
        if entry.count < self.max {
            entry.count += 1;
            return true;
        }

        //over limit
        false
    }

    // Drop windows that have already ended; they would be reset on next use anyway
    pub fn purge_expired(&self, now: Instant) {
        self.windows
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < self.window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn limiter(max: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max,
            window: Duration::from_millis(window_ms),
        })
    }

    #[test]
    fn test_eleventh_request_in_window_is_rejected() {
        let rl = limiter(10, 60_000);
        let t0 = Instant::now();

        for i in 0..10 {
            assert!(rl.admit_at("10.0.0.1", t0 + Duration::from_secs(i)), "request {}", i + 1);
        }
        assert!(!rl.admit_at("10.0.0.1", t0 + Duration::from_secs(30)));
    }

    #[test]
    fn test_new_window_admits_again() {
        let rl = limiter(10, 60_000);
        let t0 = Instant::now();
        for _ in 0..11 {
            rl.admit_at("10.0.0.1", t0);
        }
        assert!(!rl.admit_at("10.0.0.1", t0 + Duration::from_millis(59_999)));
        assert!(rl.admit_at("10.0.0.1", t0 + Duration::from_millis(60_000)));
        // the reset counted as the first request of the new window
        for _ in 0..9 {
            assert!(rl.admit_at("10.0.0.1", t0 + Duration::from_millis(60_001)));
        }
        assert!(!rl.admit_at("10.0.0.1", t0 + Duration::from_millis(60_002)));
    }

    #[test]
    fn test_clients_are_isolated() {
        let rl = limiter(1, 60_000);
        let t0 = Instant::now();
        assert!(rl.admit_at("10.0.0.1", t0));
        assert!(!rl.admit_at("10.0.0.1", t0));
        assert!(rl.admit_at("10.0.0.2", t0));
    }

    #[test]
    fn test_concurrent_admits_never_exceed_max() {
        let rl = Arc::new(limiter(50, 60_000));
        let mut handles = vec![];

        for _ in 0..8 {
            let rl = rl.clone();
            handles.push(thread::spawn(move || {
                (0..20).filter(|_| rl.admit("shared")).count()
            }));
        }

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn test_purge_expired() {
        let rl = limiter(5, 1_000);
        let t0 = Instant::now();
        rl.admit_at("a", t0);
        rl.admit_at("b", t0 + Duration::from_millis(900));

        rl.purge_expired(t0 + Duration::from_millis(1_500));
        assert_eq!(rl.tracked_clients(), 1);
    }
}
