//! # Runtime events emitted by the task group, listener and sessions.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Group events**: task lifecycle under the supervisor and shutdown flow
//! - **Listener events**: bind, accept failures, socket close
//! - **Session events**: open/close and transient read/write failures
//! - **Drain events**: registry shutdown progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task name,
//! session id, peer address and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use connvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WriteFailed)
//!     .with_session(7)
//!     .with_peer("127.0.0.1:50000")
//!     .with_reason("broken pipe");
//!
//! assert_eq!(ev.kind, EventKind::WriteFailed);
//! assert_eq!(ev.session, Some(7));
//! assert_eq!(ev.reason.as_deref(), Some("broken pipe"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Group events ===
    /// A task was spawned into the group.
    ///
    /// Sets: `task`.
    TaskStarting,

    /// A task returned `Ok(())` or the clean-exit sentinel.
    ///
    /// Sets: `task`, `reason` (sentinel reason, if any).
    TaskStopped,

    /// A task returned an error.
    ///
    /// Sets: `task`, `reason`.
    TaskFailed,

    /// A task panicked; the panic was converted into an error.
    ///
    /// Sets: `task`, `reason` (panic message).
    TaskPanicked,

    /// A watched host signal arrived.
    ///
    /// Sets: `reason` (signal name).
    SignalReceived,

    /// The group's cancellation fired; siblings are shutting down.
    ///
    /// Sets: `task` (who triggered it, if a task did), `reason`.
    ShutdownRequested,

    /// Tasks were still running when the group grace period elapsed; they were aborted.
    ///
    /// Sets: `timeout_ms`, `reason` (names of aborted tasks).
    GraceExceeded,

    // === Listener events ===
    /// Listening socket is bound and accepting.
    ///
    /// Sets: `peer` (local address).
    ListenerBound,

    /// `accept` failed before shutdown was requested; the listener keeps going.
    ///
    /// Sets: `reason`, `timeout_ms` (retry delay).
    AcceptFailed,

    /// Listening socket closed; no further connections are accepted.
    ///
    /// Sets: `peer` (local address).
    ListenerClosed,

    // === Session events ===
    /// A connection was accepted and its reader/writer started.
    ///
    /// Sets: `session`, `peer`.
    SessionOpened,

    /// Both reader and writer of a session have returned; transport closed.
    ///
    /// Sets: `session`, `peer`, `reason` ("eof", "stopped", "aborted", ...).
    SessionClosed,

    /// A transient read error; the reader continues.
    ///
    /// Sets: `session`, `peer`, `reason`.
    ReadFailed,

    /// A write error; the writer continues with the next frame.
    ///
    /// Sets: `session`, `peer`, `reason`.
    WriteFailed,

    // === Drain events ===
    /// Registry started stopping every tracked session.
    ///
    /// Sets: `reason` (number of sessions).
    DrainStarted,

    /// Every tracked session stopped.
    DrainCompleted,

    /// Drain grace elapsed; remaining sessions were force-aborted.
    ///
    /// Sets: `timeout_ms`, `reason` (number of aborted sessions).
    DrainTimedOut,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Session id, if applicable.
    pub session: Option<u64>,
    /// Remote (or, for listener events, local) address.
    pub peer: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Timeout or delay in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            session: None,
            peer: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a session id.
    #[inline]
    pub fn with_session(mut self, id: u64) -> Self {
        self.session = Some(id);
        self
    }

    /// Attaches a peer (or local) address.
    #[inline]
    pub fn with_peer(mut self, peer: impl Into<Arc<str>>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Attaches a timeout/delay (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events emitted by the subscriber machinery itself.
    ///
    /// Their own overflow is never re-reported, which would loop.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
