//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the task group, the
//! listener, the signal watcher, the session registry and every session.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! Transient I/O failures never leave their session as errors; they are
//! reported here (`ReadFailed`, `WriteFailed`, `AcceptFailed`) and rendered by
//! subscribers such as [`LogWriter`](crate::LogWriter).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
