//! # Fault injection for supervised tasks.
//!
//! [`FaultInjection`] is handed to a task constructor (see
//! [`ListenerTask::with_fault`](crate::ListenerTask::with_fault)) to make it fail
//! or panic at startup. Nothing is global: each task carries its own plan.

use crate::error::TaskError;

/// What a task should do at startup instead of its real work.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FaultInjection {
    /// Run normally.
    #[default]
    None,
    /// Return [`TaskError::Fail`] with this message.
    Error(String),
    /// Panic with this message (surfaces as [`TaskError::Panicked`]).
    Panic(String),
}

impl FaultInjection {
    /// Applies the plan at the injection point.
    ///
    /// # Panics
    /// Deliberately, for [`FaultInjection::Panic`].
    pub fn trigger(&self) -> Result<(), TaskError> {
        match self {
            FaultInjection::None => Ok(()),
            FaultInjection::Error(msg) => Err(TaskError::Fail { error: msg.clone() }),
            FaultInjection::Panic(msg) => panic!("{msg}"),
        }
    }
}
