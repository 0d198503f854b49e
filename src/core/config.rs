//! # Runtime configuration.
//!
//! [`Config`] centralizes the settings of a [`Server`](crate::Server) run.
//!
//! ## Sentinel values
//! - `grace = 0s` → wait for tasks indefinitely after cancellation
//! - `drain_grace = 0s` → wait for sessions indefinitely during drain
//! - `max_read_errors = 0` → a session reader never gives up on transient errors

use std::time::Duration;

use crate::core::backoff::AcceptBackoff;
use crate::core::signal::Signal;
use crate::session::SessionOptions;

/// Configuration for one server run.
///
/// ## Field semantics
/// - `listen_addr`: address the listener binds (`host:port`)
/// - `signals`: host signals that end the run cleanly
/// - `grace`: how long the group waits for tasks after cancellation (`0s` = unbounded)
/// - `drain_grace`: how long the registry waits for sessions to stop (`0s` = unbounded)
/// - `handoff_capacity`: per-session reader→writer channel size (min 1)
/// - `max_frame_len`: longest accepted inbound line, in bytes (min 1)
/// - `max_read_errors`: consecutive transient read errors tolerated (`0` = unlimited)
/// - `accept_backoff`: delay policy between failed accepts
/// - `bus_capacity`: event bus ring buffer size (min 1)
///
/// All fields are public. Prefer the accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the listener binds.
    pub listen_addr: String,

    /// Signals that end the run with a clean exit.
    ///
    /// Ignored on non-unix platforms, where only Ctrl-C is watched.
    pub signals: Vec<Signal>,

    /// Maximum wait for tasks once the group is cancelled.
    ///
    /// Tasks still running afterwards are aborted and `GraceExceeded` is published.
    pub grace: Duration,

    /// Maximum wait for sessions to stop during the listener's drain.
    ///
    /// Sessions still running afterwards are aborted and `DrainTimedOut` is published.
    pub drain_grace: Duration,

    /// Capacity of each session's handoff channel.
    pub handoff_capacity: usize,

    /// Maximum inbound frame length in bytes.
    pub max_frame_len: usize,

    /// Consecutive transient read errors before a session reader stops.
    pub max_read_errors: u32,

    /// Backoff between consecutive accept failures.
    pub accept_backoff: AcceptBackoff,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl Config {
    /// Group grace as an `Option` (`None` = unbounded).
    #[inline]
    pub fn grace_limit(&self) -> Option<Duration> {
        (!self.grace.is_zero()).then_some(self.grace)
    }

    /// Drain grace as an `Option` (`None` = unbounded).
    #[inline]
    pub fn drain_limit(&self) -> Option<Duration> {
        (!self.drain_grace.is_zero()).then_some(self.drain_grace)
    }

    /// Handoff capacity clamped to a minimum of 1.
    #[inline]
    pub fn handoff_capacity_clamped(&self) -> usize {
        self.handoff_capacity.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Per-session options derived from this config.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            handoff_capacity: self.handoff_capacity_clamped(),
            max_read_errors: self.max_read_errors,
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `listen_addr = 127.0.0.1:6666`
    /// - `signals = [SIGHUP, SIGQUIT, SIGTERM, SIGINT]`
    /// - `grace = 0s`, `drain_grace = 0s` (unbounded)
    /// - `handoff_capacity = 64`, `max_frame_len = 64 KiB`, `max_read_errors = 16`
    /// - `accept_backoff = AcceptBackoff::default()`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:6666".to_string(),
            signals: Signal::termination(),
            grace: Duration::ZERO,
            drain_grace: Duration::ZERO,
            handoff_capacity: 64,
            max_frame_len: 64 * 1024,
            max_read_errors: 16,
            accept_backoff: AcceptBackoff::default(),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_durations_mean_unbounded() {
        let cfg = Config::default();
        assert_eq!(cfg.grace_limit(), None);
        assert_eq!(cfg.drain_limit(), None);

        let cfg = Config {
            grace: Duration::from_secs(3),
            drain_grace: Duration::from_millis(500),
            ..Config::default()
        };
        assert_eq!(cfg.grace_limit(), Some(Duration::from_secs(3)));
        assert_eq!(cfg.drain_limit(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn capacities_are_clamped() {
        let cfg = Config {
            handoff_capacity: 0,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.handoff_capacity_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.session_options().handoff_capacity, 1);
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr, "127.0.0.1:6666");
        assert_eq!(cfg.signals.len(), 4);
        assert_eq!(cfg.max_frame_len, 65536);
        assert_eq!(cfg.session_options().max_read_errors, 16);
    }
}
