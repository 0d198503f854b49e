//! Runtime core: orchestration and lifecycle.
//!
//! - [`cancel`]: single-fire cancellation source with many waiters;
//! - [`group`]: sibling tasks with first-error-wins and a fault boundary;
//! - [`signal`]: host signals as a clean-exit trigger;
//! - [`listener`]: accept loop feeding the session registry;
//! - [`server`]: wires listener and signal watcher into one group;
//! - [`config`], [`backoff`], [`fault`]: settings, accept retry delays, fault injection.

mod backoff;
mod cancel;
mod config;
mod fault;
mod group;
mod listener;
mod server;
mod signal;

pub use backoff::AcceptBackoff;
pub use cancel::CancelSource;
pub use config::Config;
pub use fault::FaultInjection;
pub use group::TaskGroup;
pub use listener::{Endpoint, ListenerTask};
pub use server::{LISTENER_TASK, SIGNAL_TASK, Server, ServerBuilder};
pub use signal::{OsSignals, Signal, SignalSource, SignalWatcher};

pub(crate) use group::panic_message;
