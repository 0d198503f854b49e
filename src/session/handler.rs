//! # Business boundary: inbound frame → outbound frame.
//!
//! The writer task of every session calls a [`FrameHandler`] synchronously for
//! each frame before writing the result. The runtime treats it as opaque; a
//! panic inside it is caught by the writer and reported as `WriteFailed`.

/// Derives the response written for one inbound frame.
pub trait FrameHandler: Send + Sync + 'static {
    /// Produces the outbound frame for `frame`.
    fn handle(&self, frame: &[u8]) -> Vec<u8>;
}

impl<F> FrameHandler for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    fn handle(&self, frame: &[u8]) -> Vec<u8> {
        self(frame)
    }
}

/// Acknowledges every frame with `Received <payload>`.
///
/// ```rust
/// use connvisor::{Acknowledge, FrameHandler};
///
/// assert_eq!(Acknowledge.handle(b"ping"), b"Received ping".to_vec());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Acknowledge;

impl FrameHandler for Acknowledge {
    fn handle(&self, frame: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(b"Received ".len() + frame.len());
        out.extend_from_slice(b"Received ");
        out.extend_from_slice(frame);
        out
    }
}
