//! Exponential backoff with full jitter for reconnection delays.
//!
//! Follows the AWS "Full Jitter" strategy:
//! `delay = random(0, min(cap, base * 2^attempt))`.

use std::time::Duration;

use handoff_config::ReconnectPolicy;

/// Exponential backoff calculator with full jitter, driven by a
/// [`ReconnectPolicy`].
pub(crate) struct Backoff {
    base_ms: u64,
    max_ms: u64,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            base_ms: policy.backoff_initial_ms,
            max_ms: policy.backoff_max_ms,
            max_attempts: policy.max_attempts,
            attempt: 0,
        }
    }

    /// Compute the next delay with full jitter and advance the attempt
    /// counter. Returns `None` once `max_attempts` has been exhausted.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let exp = self
            .base_ms
            .saturating_mul(1u64.checked_shl(self.attempt).unwrap_or(u64::MAX));
        let capped = exp.min(self.max_ms);
        let jittered = if capped == 0 { 0 } else { fastrand::u64(0..=capped) };
        self.attempt = self.attempt.saturating_add(1);
        Some(Duration::from_millis(jittered))
    }

    /// Reset the attempt counter after a successful (re)connection.
    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, base_ms: u64, max_ms: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            backoff_initial_ms: base_ms,
            backoff_max_ms: max_ms,
        }
    }

    #[test]
    fn first_delay_bounded_by_base() {
        let mut b = Backoff::new(&policy(100, 1000, 60_000));
        for _ in 0..50 {
            b.attempt = 0;
            let delay = b.next_delay().unwrap();
            assert!(delay <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn delay_capped_at_max() {
        let mut b = Backoff::new(&policy(100, 1000, 5000));
        for _ in 0..20 {
            let delay = b.next_delay().unwrap();
            assert!(delay <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut b = Backoff::new(&policy(3, 10, 100));
        assert!(b.next_delay().is_some());
        assert!(b.next_delay().is_some());
        assert!(b.next_delay().is_some());
        assert!(b.next_delay().is_none());
    }

    #[test]
    fn reset_allows_further_attempts() {
        let mut b = Backoff::new(&policy(1, 10, 100));
        assert!(b.next_delay().is_some());
        assert!(b.next_delay().is_none());
        b.reset();
        assert!(b.next_delay().is_some());
    }

    #[test]
    fn zero_base_produces_zero_delay() {
        let mut b = Backoff::new(&policy(10, 0, 0));
        for _ in 0..5 {
            assert_eq!(b.next_delay().unwrap(), Duration::ZERO);
        }
    }
}
