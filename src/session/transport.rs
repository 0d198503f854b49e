//! # Transport boundary: framed reads, raw writes, close.
//!
//! A session never touches sockets directly. It drives a [`FrameRead`] (reader
//! task) and a [`FrameWrite`] (writer task), obtained by splitting a
//! [`Transport`]. [`LineTransport`] is the stock implementation: newline
//! delimited frames over any tokio byte stream.
//!
//! ## Line framing rules
//! - A frame is the bytes up to `\n`; a trailing `\r` is stripped too.
//! - A final unterminated line before end-of-stream is still delivered.
//! - Lines longer than `max_frame_len` are discarded up to their newline and
//!   reported once as [`FrameError::TooLong`] (transient; reading continues).
//! - Each written frame is followed by `\n`.

use std::io;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};

use crate::error::FrameError;

/// One complete logical message.
pub type Frame = Vec<u8>;

/// Read side of a connection.
#[async_trait]
pub trait FrameRead: Send + 'static {
    /// Reads the next frame. `Ok(None)` is a clean end-of-stream.
    async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError>;
}

/// Write side of a connection.
#[async_trait]
pub trait FrameWrite: Send + 'static {
    /// Writes one outbound frame.
    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Flushes and closes the write direction.
    async fn close(&mut self) -> io::Result<()>;
}

/// A duplex connection that can be split into independently owned halves.
pub trait Transport: Send + 'static {
    /// Reader half.
    type Reader: FrameRead;
    /// Writer half.
    type Writer: FrameWrite;

    /// Label for the remote end (e.g. `127.0.0.1:51512`).
    fn peer(&self) -> String;

    /// Splits into reader and writer.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Newline-delimited framing over a tokio byte stream.
///
/// # Example
/// ```rust
/// use connvisor::{FrameRead, FrameWrite, LineTransport, Transport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let (a, b) = tokio::io::duplex(64);
/// let (_, mut tx) = LineTransport::new(a, "a", 1024).split();
/// let (mut rx, _) = LineTransport::new(b, "b", 1024).split();
///
/// tx.write_frame(b"ping").await?;
/// assert_eq!(rx.read_frame().await.unwrap(), Some(b"ping".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LineTransport<T> {
    io: T,
    peer: String,
    max_frame_len: usize,
}

impl<T> LineTransport<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Wraps `io`; `max_frame_len` is clamped to at least 1.
    pub fn new(io: T, peer: impl Into<String>, max_frame_len: usize) -> Self {
        Self {
            io,
            peer: peer.into(),
            max_frame_len: max_frame_len.max(1),
        }
    }
}

impl<T> Transport for LineTransport<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Reader = LineReader<ReadHalf<T>>;
    type Writer = LineWriter<WriteHalf<T>>;

    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (r, w) = tokio::io::split(self.io);
        (
            LineReader::new(r, self.max_frame_len),
            LineWriter { inner: w },
        )
    }
}

/// Reader half of [`LineTransport`].
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max: usize,
    discarding: bool,
    discarded: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R, max: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
            max,
            discarding: false,
            discarded: 0,
        }
    }

    fn finish(&mut self) -> Frame {
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        std::mem::take(&mut self.buf)
    }
}

#[async_trait]
impl<R> FrameRead for LineReader<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        loop {
            // Never buffer more than one byte past the limit.
            let room = (self.max + 1).saturating_sub(self.buf.len()).max(1) as u64;
            let n = (&mut self.inner)
                .take(room)
                .read_until(b'\n', &mut self.buf)
                .await?;

            if n == 0 {
                if self.discarding || self.buf.is_empty() {
                    self.buf.clear();
                    self.discarding = false;
                    return Ok(None);
                }
                return Ok(Some(self.finish()));
            }

            let complete = self.buf.last() == Some(&b'\n');

            if self.discarding {
                self.discarded += self.buf.len();
                self.buf.clear();
                if complete {
                    self.discarding = false;
                    let len = std::mem::take(&mut self.discarded);
                    return Err(FrameError::TooLong { len, max: self.max });
                }
                continue;
            }

            if complete {
                return Ok(Some(self.finish()));
            }

            if self.buf.len() > self.max {
                self.discarding = true;
                self.discarded = self.buf.len();
                self.buf.clear();
            }
        }
    }
}

/// Writer half of [`LineTransport`].
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
}

#[async_trait]
impl<W> FrameWrite for LineWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.inner.write_all(frame).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}
