//! # Cancellation source: a fire-once latch shared by every task of a run.
//!
//! [`CancelSource`] is the single "stop now" signal of a [`TaskGroup`](crate::TaskGroup).
//! It wraps a [`CancellationToken`]: firing is idempotent and latched, and any
//! number of observers can poll [`CancelSource::is_fired`] or await
//! [`CancelSource::fired`].
//!
//! ## Rules
//! - `fire()` may be called from any task, any number of times; only the first call
//!   changes state and returns `true`.
//! - Once fired, it stays fired; waiters registered before or after firing all complete.
//! - Child tokens (`child()`) fire with the parent but can also be fired alone,
//!   without affecting the parent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Fire-once, multi-observer cancellation signal.
///
/// # Example
/// ```rust
/// use connvisor::CancelSource;
///
/// let source = CancelSource::new();
/// assert!(!source.is_fired());
/// assert!(source.fire());
/// assert!(!source.fire()); // already fired
/// assert!(source.token().is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelSource {
    token: CancellationToken,
    first: Arc<AtomicBool>,
}

impl CancelSource {
    /// Creates an armed (not yet fired) source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that fires whenever `parent` is cancelled.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            first: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fires the source. Returns `true` only for the first `fire()` call on this source
    /// (a parent cancellation does not count as a call).
    pub fn fire(&self) -> bool {
        let won = !self.first.swap(true, Ordering::AcqRel);
        self.token.cancel();
        won
    }

    /// Non-blocking check.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the source has fired; immediately if it already has.
    pub async fn fired(&self) {
        self.token.cancelled().await
    }

    /// Observer handle handed to tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token that is cancelled with this source but can be cancelled on its own.
    pub fn child(&self) -> CancellationToken {
        self.token.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_fire_has_one_winner_and_latches() {
        let source = CancelSource::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let s = source.clone();
            handles.push(tokio::spawn(async move { s.fire() }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(source.is_fired());
        // stays fired
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(source.is_fired());
        assert!(source.token().is_cancelled());
    }

    #[tokio::test]
    async fn waiters_before_and_after_fire_complete() {
        let source = CancelSource::new();

        let early = {
            let s = source.clone();
            tokio::spawn(async move { s.fired().await })
        };
        tokio::task::yield_now().await;
        source.fire();

        tokio::time::timeout(Duration::from_secs(1), early)
            .await
            .expect("early waiter woke")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), source.fired())
            .await
            .expect("late waiter returns immediately");
    }

    #[tokio::test]
    async fn child_fires_alone_without_parent() {
        let source = CancelSource::new();
        let child = source.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!source.is_fired());

        let other = source.child();
        source.fire();
        assert!(other.is_cancelled());
    }

    #[test]
    fn parent_token_propagates() {
        let root = CancellationToken::new();
        let source = CancelSource::with_parent(&root);
        root.cancel();
        assert!(source.is_fired());
    }
}
