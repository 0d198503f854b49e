//! # Event subscribers for the connvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`] (feature `logging`).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Session / Listener / TaskGroup ── publish(Event) ──► Bus ──► event pump
//!                                                                   │
//!                                                                   ▼
//!                                                             SubscriberSet
//!                                                         ┌────────┼─────────┐
//!                                                         ▼        ▼         ▼
//!                                                     LogWriter  Metrics  Custom
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
