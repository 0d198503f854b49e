//! # Accept retry backoff.
//!
//! [`AcceptBackoff`] spaces out retries after consecutive accept failures
//! (e.g. `EMFILE` when the process runs out of descriptors). The base delay for
//! attempt `n` is `first × 2^n`, clamped to `max`, then equal jitter is applied:
//! `base/2 + random[0, base/2]`. The base never depends on a previous jittered
//! value, so delays cannot drift downwards.
//!
//! ```rust
//! use std::time::Duration;
//! use connvisor::AcceptBackoff;
//!
//! let b = AcceptBackoff { first: Duration::from_millis(10), max: Duration::from_secs(1) };
//! let d = b.delay(3);
//! assert!(d >= Duration::from_millis(40) && d <= Duration::from_millis(80));
//! assert!(b.delay(30) <= Duration::from_secs(1));
//! ```

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with equal jitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptBackoff {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
}

impl Default for AcceptBackoff {
    /// `first = 5ms`, `max = 1s`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(5),
            max: Duration::from_secs(1),
        }
    }
}

impl AcceptBackoff {
    /// Un-jittered delay for `attempt` (0-indexed).
    pub fn base(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.first.saturating_mul(factor).min(self.max)
    }

    /// Jittered delay for `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = self.base(attempt).as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let half = ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::rng().random_range(0..=half)
        };
        Duration::from_millis(half + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_grows_and_caps() {
        let b = AcceptBackoff {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
        };
        assert_eq!(b.base(0), Duration::from_millis(100));
        assert_eq!(b.base(1), Duration::from_millis(200));
        assert_eq!(b.base(3), Duration::from_millis(800));
        assert_eq!(b.base(4), Duration::from_secs(1));
        assert_eq!(b.base(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_in_upper_half() {
        let b = AcceptBackoff {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
        };
        for _ in 0..200 {
            let d = b.delay(2);
            assert!(d >= Duration::from_millis(200), "{d:?}");
            assert!(d <= Duration::from_millis(400), "{d:?}");
        }
    }

    #[test]
    fn zero_first_means_no_delay() {
        let b = AcceptBackoff {
            first: Duration::ZERO,
            max: Duration::from_secs(1),
        };
        assert_eq!(b.delay(5), Duration::ZERO);
    }
}
