//! # LogWriter: render events through `tracing`
//!
//! A subscriber that turns every [`Event`] into one structured `tracing`
//! record. Failures that the runtime tolerates (transient read/write/accept
//! errors) are logged at `warn`; task failures at `error`.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO connvisor: listener bound addr=127.0.0.1:6666
//! INFO connvisor: session opened session=3 peer=127.0.0.1:51512
//! WARN connvisor: write failed session=3 peer=127.0.0.1:51512 err=broken pipe
//! INFO connvisor: signal received signal=SIGTERM
//! INFO connvisor: drain completed
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "connvisor";

/// Event writer subscriber.
#[derive(Default, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let peer = e.peer.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let session = e.session.unwrap_or_default();

        match e.kind {
            EventKind::TaskStarting => debug!(target: TARGET, task, "task starting"),
            EventKind::TaskStopped => info!(target: TARGET, task, reason, "task stopped"),
            EventKind::TaskFailed => error!(target: TARGET, task, err = reason, "task failed"),
            EventKind::TaskPanicked => error!(target: TARGET, task, err = reason, "task panicked"),
            EventKind::SignalReceived => info!(target: TARGET, signal = reason, "signal received"),
            EventKind::ShutdownRequested => {
                info!(target: TARGET, by = task, reason, "shutdown requested")
            }
            EventKind::GraceExceeded => warn!(
                target: TARGET,
                grace_ms = e.timeout_ms,
                aborted = reason,
                "grace exceeded, tasks aborted"
            ),
            EventKind::ListenerBound => info!(target: TARGET, addr = peer, "listener bound"),
            EventKind::AcceptFailed => warn!(
                target: TARGET,
                err = reason,
                retry_ms = e.timeout_ms,
                "accept failed"
            ),
            EventKind::ListenerClosed => info!(target: TARGET, addr = peer, "listener closed"),
            EventKind::SessionOpened => info!(target: TARGET, session, peer, "session opened"),
            EventKind::SessionClosed => {
                info!(target: TARGET, session, peer, reason, "session closed")
            }
            EventKind::ReadFailed => {
                warn!(target: TARGET, session, peer, err = reason, "read failed")
            }
            EventKind::WriteFailed => {
                warn!(target: TARGET, session, peer, err = reason, "write failed")
            }
            EventKind::DrainStarted => info!(target: TARGET, sessions = reason, "drain started"),
            EventKind::DrainCompleted => info!(target: TARGET, "drain completed"),
            EventKind::DrainTimedOut => warn!(
                target: TARGET,
                grace_ms = e.timeout_ms,
                aborted = reason,
                "drain timed out, sessions aborted"
            ),
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = task, reason, "subscriber dropped event")
            }
            EventKind::SubscriberPanicked => {
                error!(target: TARGET, subscriber = task, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
