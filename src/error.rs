//! Error types used by the connvisor runtime, its tasks and its sessions.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`]: the single terminal condition a [`Server`](crate::Server)
//!   or [`TaskGroup`](crate::TaskGroup) reports to its caller.
//! - [`TaskError`]: what a supervised task returns, including the clean-exit
//!   sentinel [`TaskError::Exited`].
//! - [`FrameError`]: a failed frame read on one connection; never leaves the
//!   owning session.
//!
//! `RuntimeError` and `TaskError` provide `as_label`/`as_message` helpers for
//! logs and metrics, in the same shape as the rest of the event model.

use std::io;

use thiserror::Error;

/// # Errors reported by the runtime to its caller.
///
/// `Ok(())` means clean shutdown (signal, explicit request, or every task
/// finished). Anything else is the first failing task, preserved as the source.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A supervised task failed; it was the first failure observed by the group.
    #[error("task `{task}` failed: {source}")]
    TaskFailed {
        /// Name the task was spawned under.
        task: String,
        /// The error the task returned (or its converted panic).
        #[source]
        source: TaskError,
    },

    /// Host signal handlers could not be installed.
    #[error("signal registration failed: {0}")]
    SignalSetup(#[source] io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use connvisor::{RuntimeError, TaskError};
    ///
    /// let err = RuntimeError::TaskFailed {
    ///     task: "listener".into(),
    ///     source: TaskError::Fail { error: "boom".into() },
    /// };
    /// assert_eq!(err.as_label(), "runtime_task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::TaskFailed { .. } => "runtime_task_failed",
            RuntimeError::SignalSetup(_) => "runtime_signal_setup",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::TaskFailed { task, source } => {
                format!("task={task} {}", source.as_message())
            }
            RuntimeError::SignalSetup(e) => format!("signal setup: {e}"),
        }
    }

    /// The task error behind a [`RuntimeError::TaskFailed`], if any.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            RuntimeError::TaskFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// # Errors returned by supervised tasks.
///
/// Every variant except [`TaskError::Exited`] is a failure: the group records
/// the first one and cancels all siblings. `Exited` cancels siblings too but is
/// never reported as a failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// An I/O operation the task depends on failed (bind, signal install, ...).
    #[error("{context}: {source}")]
    Io {
        /// What the task was doing, e.g. `listen on 0.0.0.0:80 failed`.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Generic task failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The task panicked; the panic was caught at the task boundary.
    #[error("panic recovered: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
        /// Backtrace captured at the task boundary (may read "disabled").
        backtrace: String,
    },

    /// Clean-exit sentinel: the task ended the run on purpose (e.g. a signal).
    #[error("exited: {reason}")]
    Exited {
        /// Why the task ended the run.
        reason: String,
    },
}

impl TaskError {
    /// Wraps an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        TaskError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use connvisor::TaskError;
    ///
    /// let err = TaskError::Exited { reason: "signal SIGTERM".into() };
    /// assert_eq!(err.as_label(), "task_exited");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Io { .. } => "task_io",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Exited { .. } => "task_exited",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Io { context, source } => format!("io: {context}: {source}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { message, .. } => format!("panic: {message}"),
            TaskError::Exited { reason } => format!("exited: {reason}"),
        }
    }

    /// True for the clean-exit sentinel, which is never classified as failure.
    ///
    /// ```
    /// use connvisor::TaskError;
    ///
    /// assert!(TaskError::Exited { reason: "signal".into() }.is_clean_exit());
    /// assert!(!TaskError::Fail { error: "nope".into() }.is_clean_exit());
    /// ```
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, TaskError::Exited { .. })
    }
}

/// # A failed frame read on a live connection.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FrameError {
    /// Transport-level read failure.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// The frame exceeded the configured maximum and was discarded.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLong {
        /// Bytes consumed for the discarded frame.
        len: usize,
        /// Configured limit.
        max: usize,
    },
}

impl FrameError {
    /// True when the connection cannot produce further frames.
    ///
    /// Resets, aborts, broken pipes and unexpected EOFs end the reader like a
    /// clean end-of-stream. Everything else is transient: reported, then the
    /// reader keeps going.
    pub fn is_terminal(&self) -> bool {
        match self {
            FrameError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotConnected
            ),
            FrameError::TooLong { .. } => false,
        }
    }
}
