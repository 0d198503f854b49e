//! # connvisor
//!
//! **Connvisor** is a small supervised runtime for line-protocol TCP servers.
//!
//! It runs an accept loop and a host-signal watcher as sibling tasks under one
//! first-error-wins group, drives every accepted connection with a dedicated
//! reader and writer task, and shuts the whole tree down in order: stop
//! accepting, drain the live sessions, then return the first failure (if any).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │  Server                                       │
//!                    │  - Bus (broadcast events)                     │
//!                    │  - SubscriberSet (fans out to subscribers)    │
//!                    │  - SessionRegistry (live connections)         │
//!                    │  - root CancelSource (Server::shutdown)       │
//!                    └───────┬───────────────────────────────┬───────┘
//!                            ▼                               ▼
//!                  ┌────────────────────┐          ┌────────────────────┐
//!                  │ TaskGroup          │          │ event pump         │
//!                  │  ├─ "listener"     │          │ Bus ─► emit(&Event)│
//!                  │  └─ "signals"      │          └────────────────────┘
//!                  └───┬────────────────┘
//!                      ▼
//!         ListenerTask: accept ─► LineTransport ─► ConnectionSession
//!                                                     ├─ reader task ─┐ bounded
//!                                                     └─ writer task ◄┘ handoff
//! ```
//!
//! ### Lifecycle
//! ```text
//! run()
//!   ├─ signal arrives   ─► "signals" returns Exited{..} (clean-exit sentinel)
//!   ├─ shutdown()       ─► root source fires
//!   └─ listener fails   ─► first error recorded
//!          │
//!          ▼ cancellation reaches every task
//!   listener: close socket ─► registry drain (stop every session) ─► Ok
//!   signals:  Ok
//!          │
//!          ▼
//!   Ok(()) or Err(RuntimeError::TaskFailed{ first error })
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                          |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Server**        | Listener + signal watcher with ordered shutdown.                 | [`Server`], [`Config`]                      |
//! | **Task groups**   | Sibling tasks, first-error-wins, panic boundary, bounded grace.  | [`TaskGroup`], [`CancelSource`]             |
//! | **Sessions**      | Reader/writer pair per connection, idempotent stop.              | [`ConnectionSession`], [`SessionRegistry`]  |
//! | **Transport**     | Newline framing over any tokio byte stream.                      | [`LineTransport`], [`FrameRead`], [`FrameWrite`] |
//! | **Handlers**      | Per-frame business logic.                                        | [`FrameHandler`], [`Acknowledge`]           |
//! | **Subscriber API**| Hook into lifecycle and I/O events.                              | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for runtime, tasks and framing.                     | [`RuntimeError`], [`TaskError`], [`FrameError`] |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], which renders events through `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use connvisor::{Acknowledge, Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         listen_addr: "0.0.0.0:6666".into(),
//!         ..Config::default()
//!     };
//!
//!     Server::new(cfg).run(Arc::new(Acknowledge)).await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod session;

pub mod events;
pub mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    AcceptBackoff, CancelSource, Config, Endpoint, FaultInjection, LISTENER_TASK, ListenerTask,
    OsSignals, SIGNAL_TASK, Server, ServerBuilder, Signal, SignalSource, SignalWatcher, TaskGroup,
};
pub use error::{FrameError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use session::{
    Acknowledge, ConnectionSession, Frame, FrameHandler, FrameRead, FrameWrite, LineReader,
    LineTransport, LineWriter, SessionId, SessionOptions, SessionRegistry, SessionState, Transport,
};
pub use subscribers::{Subscribe, SubscriberSet};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
