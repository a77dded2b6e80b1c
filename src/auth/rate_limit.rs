use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEFAULT_MAX_FAILURES: usize = 5;
const DEFAULT_WINDOW_SECS: u64 = 900; // 15 minutes

/// Per-IP counter of failed admin-secret checks.
#[derive(Clone)]
pub struct RateLimiter {
    failures: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
    max_failures: usize,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES, Duration::from_secs(DEFAULT_WINDOW_SECS))
    }
}

impl RateLimiter {
    pub fn new(max_failures: usize, window: Duration) -> Self {
        Self {
            failures: Arc::new(Mutex::new(HashMap::new())),
            max_failures: max_failures.max(1),
            window,
        }
    }

    /// True once `ip` has failed `max_failures` times within the window.
    /// Stale entries for `ip` are dropped on the way.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let mut map = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let Some(timestamps) = map.get_mut(&ip) else {
            return false;
        };
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        if timestamps.is_empty() {
            map.remove(&ip);
            return false;
        }
        timestamps.len() >= self.max_failures
    }

    /// Records a failure for `ip` and drops addresses whose failures have all expired.
    pub fn record_failure(&self, ip: IpAddr) {
        let mut map = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        map.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < self.window);
            !timestamps.is_empty()
        });
        map.entry(ip).or_default().push(now);
    }

    /// Number of addresses with failures still inside the window.
    pub fn tracked(&self) -> usize {
        self.failures.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self, ip: IpAddr) {
        let mut map = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_max_failures_and_clears() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        assert!(!limiter.is_blocked(ip));
        limiter.record_failure(ip);
        assert!(!limiter.is_blocked(ip));
        limiter.record_failure(ip);
        assert!(limiter.is_blocked(ip));

        limiter.clear(ip);
        assert!(!limiter.is_blocked(ip));
    }

    #[test]
    fn failures_expire_after_window() {
        let limiter = RateLimiter::new(1, Duration::ZERO);
        let ip: IpAddr = "10.0.0.8".parse().unwrap();
        limiter.record_failure(ip);
        assert!(!limiter.is_blocked(ip));
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn expired_addresses_are_forgotten() {
        let limiter = RateLimiter::new(3, Duration::from_millis(200));
        for last in 1..=20u8 {
            limiter.record_failure(IpAddr::from([10, 0, 1, last]));
        }
        assert_eq!(limiter.tracked(), 20);

        std::thread::sleep(Duration::from_millis(300));
        limiter.record_failure("10.0.2.1".parse().unwrap());
        assert_eq!(limiter.tracked(), 1);
    }
}
