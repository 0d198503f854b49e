//! Connection layer: framing, sessions, and the live-session registry.
//!
//! - [`transport`]: frame read/write boundary and the newline-delimited [`LineTransport`];
//! - [`handler`]: the per-frame business callback ([`FrameHandler`]);
//! - [`session`]: one connection driven by a reader and a writer task;
//! - [`registry`]: the set of live sessions and their bounded shutdown.

mod handler;
mod registry;
#[allow(clippy::module_inception)]
mod session;
mod transport;

pub use handler::{Acknowledge, FrameHandler};
pub use registry::SessionRegistry;
pub use session::{ConnectionSession, SessionId, SessionOptions, SessionState};
pub use transport::{Frame, FrameRead, FrameWrite, LineReader, LineTransport, LineWriter, Transport};
