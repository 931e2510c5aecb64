//! Sliding-window rate limiter.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Admits at most `capacity` requests within any trailing `window`.
///
/// Admission timestamps older than the window are pruned on every check, so
/// the queue never holds more than `capacity` entries.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity,
            window,
            requests: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Try to admit a request now.
    pub fn check(&self) -> bool {
        self.check_at(Instant::now())
    }

    /// Try to admit a request at `now`. Callers must pass non-decreasing
    /// instants.
    pub fn check_at(&self, now: Instant) -> bool {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(&oldest) = requests.front() {
            if now.saturating_duration_since(oldest) < self.window {
                break;
            }
            requests.pop_front();
        }
        if requests.len() >= self.capacity {
            return false;
        }
        requests.push_back(now);
        true
    }

    /// Number of admissions currently inside the window.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn should_deny_request_beyond_capacity_within_window() {
        let limiter = RateLimiter::new(10, MINUTE);
        let start = Instant::now();
        for i in 0..10 {
            assert!(limiter.check_at(start + Duration::from_secs(i)), "call {i}");
        }
        assert!(!limiter.check_at(start + Duration::from_secs(10)));
        assert_eq!(limiter.in_flight(), 10);
    }

    #[test]
    fn should_replenish_capacity_when_window_elapses() {
        let limiter = RateLimiter::new(2, MINUTE);
        let start = Instant::now();
        assert!(limiter.check_at(start));
        assert!(limiter.check_at(start + Duration::from_secs(30)));
        assert!(!limiter.check_at(start + Duration::from_secs(59)));
        assert!(limiter.check_at(start + MINUTE));
        assert!(!limiter.check_at(start + Duration::from_secs(61)));
        assert!(limiter.check_at(start + Duration::from_secs(90)));
    }

    #[test]
    fn should_not_count_denied_requests() {
        let limiter = RateLimiter::new(1, MINUTE);
        let start = Instant::now();
        assert!(limiter.check_at(start));
        for i in 1..20 {
            assert!(!limiter.check_at(start + Duration::from_secs(i)));
        }
        assert!(limiter.check_at(start + MINUTE));
    }

    #[test]
    fn should_never_admit_more_than_capacity_in_any_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        let start = Instant::now();
        let admitted: Vec<u64> = (0..100)
            .filter(|step| limiter.check_at(start + Duration::from_millis(step * 350)))
            .collect();
        for (i, &at) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|&&later| (later - at) * 350 < 10_000)
                .count();
            assert!(in_window <= 3, "window starting at step {at} admitted {in_window}");
        }
    }

    #[test]
    fn should_deny_everything_when_capacity_is_zero() {
        let limiter = RateLimiter::new(0, MINUTE);
        assert!(!limiter.check());
    }
}
