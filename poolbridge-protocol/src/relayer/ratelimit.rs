// Sliding-window request limiter, tracked per caller identity.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    callers: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        RateLimiter {
            window,
            max_requests,
            callers: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request for `caller` and reports whether it is allowed.
    /// Rejected requests are not recorded, so a flood of rejections does
    /// not extend the lockout.
    pub fn allow(&self, caller: &str) -> bool {
        self.allow_at(caller, Instant::now())
    }

    fn allow_at(&self, caller: &str, now: Instant) -> bool {
        let mut callers = self.callers.lock().unwrap();
        let timestamps = callers.entry(caller.to_string()).or_default();
        while let Some(&front) = timestamps.front() {
            if now.duration_since(front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_per_window_cap() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        let t0 = Instant::now();
        assert!(limiter.allow_at("alice", t0));
        assert!(limiter.allow_at("alice", t0 + Duration::from_secs(1)));
        assert!(limiter.allow_at("alice", t0 + Duration::from_secs(2)));
        assert!(!limiter.allow_at("alice", t0 + Duration::from_secs(3)));
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let t0 = Instant::now();
        assert!(limiter.allow_at("alice", t0));
        assert!(limiter.allow_at("alice", t0 + Duration::from_secs(30)));
        assert!(!limiter.allow_at("alice", t0 + Duration::from_secs(31)));
        // First request ages out of the window
        assert!(limiter.allow_at("alice", t0 + Duration::from_secs(61)));
    }

    #[test]
    fn callers_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let t0 = Instant::now();
        assert!(limiter.allow_at("alice", t0));
        assert!(!limiter.allow_at("alice", t0));
        assert!(limiter.allow_at("bob", t0));
    }
}
