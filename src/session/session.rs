//! # ConnectionSession: one connection, one reader task, one writer task.
//!
//! ```text
//!            ┌──────────── reader task ────────────┐          ┌──────── writer task ────────┐
//! transport ─► read_frame ─► tx.send(frame) ──────►│ handoff  │─► rx.recv ─► handler.handle │─► write_frame ─► transport
//!            │  ▲ closed-flag checked every frame  │ (bounded)│   writes raced vs closed    │
//!            │  └ exits: EOF / stop / terminal err │          │   drained → close() → done  │
//!            └──────── drops tx (closes channel) ──┘          └─────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! `Pending → Running → Stopping → Stopped`
//!
//! - [`ConnectionSession::start`] launches both tasks together.
//! - [`ConnectionSession::stop`] raises the closed-flag, which interrupts a blocked
//!   read or write, then joins the reader and the writer. Idempotent; concurrent
//!   callers all return only after the session is fully stopped.
//! - On end-of-stream or a terminal read error the reader exits by itself; the
//!   writer drains what is queued and exits; [`ConnectionSession::finished`]
//!   completes. Call `stop` to join and release (the registry does this).
//!
//! ## Rules
//! - The handoff sender is owned by the reader alone, so the channel closes exactly
//!   once, when the reader has permanently stopped producing.
//! - A frame that was fully read is always handed off: the send is never raced
//!   against the closed-flag, and the writer only exits once the channel is
//!   closed **and** empty. Frames are written in read order.
//! - Once the closed-flag is up the writer stops writing but keeps receiving, so
//!   a reader blocked on a full handoff always gets through. Frames it cannot
//!   write any more are reported in one `WriteFailed`.
//! - Transient read errors and all write errors are published (`ReadFailed`,
//!   `WriteFailed`) and the loops keep going.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::core::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::session::handler::FrameHandler;
use crate::session::transport::{Frame, FrameRead, FrameWrite, Transport};

/// Process-unique session identifier.
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on closing the write half once the session is winding down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session tuning, usually derived from [`Config`](crate::Config).
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Handoff channel capacity (min 1).
    pub handoff_capacity: usize,
    /// Consecutive transient read errors tolerated before the reader gives up (`0` = unlimited).
    pub max_read_errors: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            handoff_capacity: 64,
            max_read_errors: 16,
        }
    }
}

/// Observable session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Constructed; tasks not launched yet.
    Pending = 0,
    /// Reader and writer running.
    Running = 1,
    /// Stop requested; waiting for both tasks.
    Stopping = 2,
    /// Both tasks returned; transport closed.
    Stopped = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Pending,
            1 => SessionState::Running,
            2 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }
}

/// Why the reader stopped producing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadEnd {
    Eof,
    Stopped,
    Broken,
    TooManyErrors,
    WriterGone,
}

impl ReadEnd {
    fn as_str(&self) -> &'static str {
        match self {
            ReadEnd::Eof => "eof",
            ReadEnd::Stopped => "stopped",
            ReadEnd::Broken => "connection_broken",
            ReadEnd::TooManyErrors => "too_many_read_errors",
            ReadEnd::WriterGone => "writer_gone",
        }
    }
}

struct Halves {
    reader: Box<dyn FrameRead>,
    writer: Box<dyn FrameWrite>,
}

struct Workers {
    reader: JoinHandle<ReadEnd>,
    writer: JoinHandle<()>,
}

/// Ownership of the transport halves, then of the tasks driving them.
enum Slot {
    Pending(Halves),
    Running(Workers),
    Taken,
}

/// Identity and reporting context shared by both tasks.
#[derive(Clone)]
struct Ctx {
    id: SessionId,
    peer: Arc<str>,
    bus: Bus,
}

impl Ctx {
    fn publish(&self, kind: EventKind, reason: impl Into<Arc<str>>) {
        self.bus.publish(
            Event::new(kind)
                .with_session(self.id)
                .with_peer(Arc::clone(&self.peer))
                .with_reason(reason),
        );
    }
}

/// One accepted connection driven by a reader and a writer task.
pub struct ConnectionSession {
    ctx: Ctx,
    opts: SessionOptions,
    handler: Arc<dyn FrameHandler>,
    closed: CancellationToken,
    done: CancellationToken,
    stopped: CancellationToken,
    state: AtomicU8,
    slot: Mutex<Slot>,
    aborts: Mutex<Vec<AbortHandle>>,
}

impl ConnectionSession {
    /// Creates a session over explicit halves. Nothing runs until [`start`](Self::start).
    pub fn new(
        peer: impl Into<Arc<str>>,
        reader: impl FrameRead,
        writer: impl FrameWrite,
        handler: Arc<dyn FrameHandler>,
        opts: SessionOptions,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx: Ctx {
                id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
                peer: peer.into(),
                bus,
            },
            opts,
            handler,
            closed: CancellationToken::new(),
            done: CancellationToken::new(),
            stopped: CancellationToken::new(),
            state: AtomicU8::new(SessionState::Pending as u8),
            slot: Mutex::new(Slot::Pending(Halves {
                reader: Box::new(reader),
                writer: Box::new(writer),
            })),
            aborts: Mutex::new(Vec::new()),
        })
    }

    /// Creates a session by splitting `transport`.
    pub fn from_transport<T: Transport>(
        transport: T,
        handler: Arc<dyn FrameHandler>,
        opts: SessionOptions,
        bus: Bus,
    ) -> Arc<Self> {
        let peer = transport.peer();
        let (reader, writer) = transport.split();
        Self::new(peer, reader, writer, handler, opts, bus)
    }

    /// Session id (unique within the process).
    pub fn id(&self) -> SessionId {
        self.ctx.id
    }

    /// Remote endpoint label.
    pub fn peer(&self) -> &str {
        &self.ctx.peer
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Launches the reader and writer. Returns `false` if already started or stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        // Held until the workers are stored: stop() sees the halves or the workers.
        let mut slot = lock(&self.slot);
        let Halves { reader, writer } = match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Pending(halves) => halves,
            other => {
                *slot = other;
                return false;
            }
        };
        if self
            .state
            .compare_exchange(
                SessionState::Pending as u8,
                SessionState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        let (tx, rx) = mpsc::channel::<Frame>(self.opts.handoff_capacity.max(1));

        let reader = tokio::spawn(read_loop(
            reader,
            tx,
            self.closed.clone(),
            self.opts.max_read_errors,
            self.ctx.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            writer,
            rx,
            Arc::clone(&self.handler),
            self.closed.clone(),
            self.done.clone(),
            self.ctx.clone(),
        ));

        lock(&self.aborts).extend([reader.abort_handle(), writer.abort_handle()]);
        *slot = Slot::Running(Workers { reader, writer });
        drop(slot);

        self.ctx.publish(EventKind::SessionOpened, "started");
        true
    }

    /// True once a stop or abort was requested.
    pub fn closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Completes once the writer has exited (the reader is already gone by then).
    pub async fn finished(&self) {
        self.done.cancelled().await
    }

    /// Stops the session and waits until reader and writer have both returned.
    ///
    /// After this returns the transport is closed and no task of this session runs.
    pub async fn stop(&self) {
        self.closed.cancel();
        let _ = self.state.compare_exchange(
            SessionState::Running as u8,
            SessionState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let taken = std::mem::replace(&mut *lock(&self.slot), Slot::Taken);
        match taken {
            Slot::Running(Workers { reader, writer }) => {
                let end = match reader.await {
                    Ok(end) => end.as_str(),
                    Err(e) if e.is_panic() => "reader_panicked",
                    Err(_) => "aborted",
                };
                let _ = writer.await;
                self.mark_stopped(end);
            }
            Slot::Pending(halves) => {
                // never started: dropping the halves closes the transport
                drop(halves);
                self.mark_stopped("never_started");
            }
            // another caller owns the join
            Slot::Taken => self.stopped.cancelled().await,
        }
    }

    /// Forced stop: aborts both tasks without waiting for them.
    pub fn abort(&self) {
        self.closed.cancel();
        let taken = std::mem::replace(&mut *lock(&self.slot), Slot::Taken);
        if let Slot::Running(Workers { reader, writer }) = &taken {
            reader.abort();
            writer.abort();
        }
        // a concurrent stop() may be joining the workers
        for h in lock(&self.aborts).drain(..) {
            h.abort();
        }
        drop(taken);
        self.mark_stopped("aborted");
    }

    fn mark_stopped(&self, reason: &'static str) {
        let prev = self
            .state
            .swap(SessionState::Stopped as u8, Ordering::AcqRel);
        if prev != SessionState::Stopped as u8 {
            self.ctx.publish(EventKind::SessionClosed, reason);
        }
        self.done.cancel();
        self.stopped.cancel();
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.ctx.id)
            .field("peer", &self.ctx.peer)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_loop(
    mut reader: Box<dyn FrameRead>,
    tx: mpsc::Sender<Frame>,
    closed: CancellationToken,
    max_errors: u32,
    ctx: Ctx,
) -> ReadEnd {
    let mut consecutive = 0u32;

    loop {
        let res = tokio::select! {
            biased;
            _ = closed.cancelled() => return ReadEnd::Stopped,
            res = reader.read_frame() => res,
        };

        match res {
            Ok(Some(frame)) => {
                consecutive = 0;
                if tx.send(frame).await.is_err() {
                    return ReadEnd::WriterGone;
                }
            }
            Ok(None) => return ReadEnd::Eof,
            Err(_) if closed.is_cancelled() => return ReadEnd::Stopped,
            Err(e) => {
                ctx.publish(EventKind::ReadFailed, e.to_string());
                if e.is_terminal() {
                    return ReadEnd::Broken;
                }
                consecutive += 1;
                if max_errors > 0 && consecutive >= max_errors {
                    return ReadEnd::TooManyErrors;
                }
            }
        }
    }
}

async fn write_loop(
    mut writer: Box<dyn FrameWrite>,
    mut rx: mpsc::Receiver<Frame>,
    handler: Arc<dyn FrameHandler>,
    closed: CancellationToken,
    done: CancellationToken,
    ctx: Ctx,
) {
    let mut unwritten = 0usize;

    while let Some(frame) = rx.recv().await {
        if closed.is_cancelled() {
            unwritten += 1;
            continue;
        }
        let out = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&frame))) {
            Ok(out) => out,
            Err(payload) => {
                ctx.publish(
                    EventKind::WriteFailed,
                    format!("handler panicked: {}", panic_message(payload.as_ref())),
                );
                continue;
            }
        };
        tokio::select! {
            biased;
            _ = closed.cancelled() => unwritten += 1,
            res = writer.write_frame(&out) => {
                if let Err(e) = res {
                    ctx.publish(EventKind::WriteFailed, e.to_string());
                }
            }
        }
    }

    if unwritten > 0 {
        ctx.publish(
            EventKind::WriteFailed,
            format!("session closed, {unwritten} frames not written"),
        );
    }
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await;
    drop(writer);
    done.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::session::handler::Acknowledge;
    use crate::session::transport::LineTransport;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Reader fed from a channel of scripted results; blocks when the script is empty.
    struct ScriptedReader(mpsc::UnboundedReceiver<Result<Option<Frame>, FrameError>>);

    #[async_trait]
    impl FrameRead for ScriptedReader {
        async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
            match self.0.recv().await {
                Some(step) => step,
                None => std::future::pending().await,
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingWriter {
        written: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: Arc<AtomicBool>,
        fail_on: Option<usize>,
        calls: Arc<AtomicU64>,
    }

    #[async_trait]
    impl FrameWrite for RecordingWriter {
        async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            if self.fail_on == Some(n) {
                return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
            }
            self.written.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        async fn close(&mut self) -> io::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    type Script = mpsc::UnboundedSender<Result<Option<Frame>, FrameError>>;

    fn scripted(writer: RecordingWriter, bus: Bus) -> (Arc<ConnectionSession>, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ConnectionSession::new(
            "test-peer",
            ScriptedReader(rx),
            writer,
            Arc::new(Acknowledge),
            SessionOptions::default(),
            bus,
        );
        (session, tx)
    }

    #[tokio::test]
    async fn frames_are_acknowledged_in_order_until_eof() {
        let writer = RecordingWriter::default();
        let (session, script) = scripted(writer.clone(), Bus::new(64));
        assert!(session.start());

        for i in 0..50 {
            script.send(Ok(Some(format!("m{i}").into_bytes()))).unwrap();
        }
        script.send(Ok(None)).unwrap();

        tokio::time::timeout(Duration::from_secs(2), session.finished())
            .await
            .expect("session finished on eof");
        session.stop().await;

        let written = writer.written.lock().unwrap().clone();
        let expected: Vec<Vec<u8>> = (0..50)
            .map(|i| format!("Received m{i}").into_bytes())
            .collect();
        assert_eq!(written, expected);
        assert!(writer.closed.load(Ordering::SeqCst));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn stop_interrupts_blocked_read_and_is_idempotent() {
        let writer = RecordingWriter::default();
        let (session, _script) = scripted(writer.clone(), Bus::new(64));
        session.start();
        assert_eq!(session.state(), SessionState::Running);

        tokio::time::timeout(Duration::from_secs(2), session.stop())
            .await
            .expect("stop returns");
        session.stop().await;

        assert!(session.closed());
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(writer.closed.load(Ordering::SeqCst));
        assert!(!session.start());
    }

    #[tokio::test]
    async fn concurrent_stops_all_wait_for_completion() {
        let (session, _script) = scripted(RecordingWriter::default(), Bus::new(64));
        session.start();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let s = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                s.stop().await;
                s.state()
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), SessionState::Stopped);
        }
    }

    #[tokio::test]
    async fn transient_read_error_does_not_end_session() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let writer = RecordingWriter::default();
        let (session, script) = scripted(writer.clone(), bus);
        session.start();

        script
            .send(Err(FrameError::Io(io::Error::from(io::ErrorKind::TimedOut))))
            .unwrap();
        script.send(Ok(Some(b"after".to_vec()))).unwrap();
        script.send(Ok(None)).unwrap();

        session.finished().await;
        session.stop().await;

        assert_eq!(
            *writer.written.lock().unwrap(),
            vec![b"Received after".to_vec()]
        );
        let mut saw_read_failed = false;
        while let Ok(ev) = events.try_recv() {
            saw_read_failed |= ev.kind == EventKind::ReadFailed;
        }
        assert!(saw_read_failed);
    }

    #[tokio::test]
    async fn terminal_read_error_ends_session() {
        let writer = RecordingWriter::default();
        let (session, script) = scripted(writer.clone(), Bus::new(64));
        session.start();

        script.send(Ok(Some(b"one".to_vec()))).unwrap();
        script
            .send(Err(FrameError::Io(io::Error::from(
                io::ErrorKind::ConnectionReset,
            ))))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), session.finished())
            .await
            .expect("terminal error ends the reader");
        session.stop().await;
        assert_eq!(*writer.written.lock().unwrap(), vec![b"Received one".to_vec()]);
    }

    #[tokio::test]
    async fn reader_gives_up_after_repeated_errors() {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ConnectionSession::new(
            "p",
            ScriptedReader(rx),
            RecordingWriter::default(),
            Arc::new(Acknowledge),
            SessionOptions {
                handoff_capacity: 1,
                max_read_errors: 3,
            },
            Bus::new(64),
        );
        session.start();
        for _ in 0..3 {
            tx.send(Err(FrameError::TooLong { len: 9, max: 1 })).unwrap();
        }

        tokio::time::timeout(Duration::from_secs(2), session.finished())
            .await
            .expect("reader gave up");
        session.stop().await;
    }

    #[tokio::test]
    async fn write_failure_is_skipped_and_next_frame_written() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let writer = RecordingWriter {
            fail_on: Some(0),
            ..Default::default()
        };
        let (session, script) = scripted(writer.clone(), bus);
        session.start();

        script.send(Ok(Some(b"first".to_vec()))).unwrap();
        script.send(Ok(Some(b"second".to_vec()))).unwrap();
        script.send(Ok(None)).unwrap();
        session.finished().await;
        session.stop().await;

        assert_eq!(
            *writer.written.lock().unwrap(),
            vec![b"Received second".to_vec()]
        );
        let failed: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::WriteFailed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].reason.as_deref(), Some("injected write failure"));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let writer = RecordingWriter::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = |frame: &[u8]| -> Vec<u8> {
            if frame == b"boom" {
                panic!("handler exploded");
            }
            frame.to_vec()
        };
        let session = ConnectionSession::new(
            "p",
            ScriptedReader(rx),
            writer.clone(),
            Arc::new(handler),
            SessionOptions::default(),
            Bus::new(64),
        );
        session.start();

        tx.send(Ok(Some(b"boom".to_vec()))).unwrap();
        tx.send(Ok(Some(b"fine".to_vec()))).unwrap();
        tx.send(Ok(None)).unwrap();
        session.finished().await;
        session.stop().await;

        assert_eq!(*writer.written.lock().unwrap(), vec![b"fine".to_vec()]);
    }

    #[tokio::test]
    async fn stop_before_start_closes_transport() {
        let (session, _script) = scripted(RecordingWriter::default(), Bus::new(8));
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.start());
    }

    /// Writer for a peer that stopped reading: every write blocks.
    struct Stalled(Arc<AtomicU64>);

    #[async_trait]
    impl FrameWrite for Stalled {
        async fn write_frame(&mut self, _: &[u8]) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
        async fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_unblocks_a_writer_stuck_on_a_non_reading_peer() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let attempts = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ConnectionSession::new(
            "flooder",
            ScriptedReader(rx),
            Stalled(Arc::clone(&attempts)),
            Arc::new(Acknowledge),
            SessionOptions {
                handoff_capacity: 1,
                max_read_errors: 16,
            },
            bus,
        );
        session.start();

        // writer blocked on the first frame, handoff full, reader blocked in send
        for i in 0..8 {
            tx.send(Ok(Some(format!("flood{i}").into_bytes()))).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::timeout(Duration::from_secs(2), session.stop())
            .await
            .expect("stop returns while the peer never reads");
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        let reasons: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::WriteFailed)
            .filter_map(|ev| ev.reason.as_deref().map(str::to_string))
            .collect();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("session closed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_start_and_stop_always_joins_the_workers() {
        for _ in 0..200 {
            let writer = RecordingWriter::default();
            let (session, _script) = scripted(writer.clone(), Bus::new(64));

            let starter = {
                let s = Arc::clone(&session);
                tokio::spawn(async move { s.start() })
            };
            let stopper = {
                let s = Arc::clone(&session);
                tokio::spawn(async move { s.stop().await })
            };
            let started = starter.await.unwrap();
            tokio::time::timeout(Duration::from_secs(2), stopper)
                .await
                .expect("stop returns")
                .unwrap();

            // whichever ran first, the racing stop returned a fully stopped session
            assert_eq!(session.state(), SessionState::Stopped);
            if started {
                assert!(writer.closed.load(Ordering::SeqCst));
            }
        }
    }

    #[tokio::test]
    async fn line_transport_round_trip_over_duplex() {
        let (server, client) = tokio::io::duplex(1024);
        let session = ConnectionSession::from_transport(
            LineTransport::new(server, "duplex", 1024),
            Arc::new(Acknowledge),
            SessionOptions::default(),
            Bus::new(64),
        );
        session.start();

        let (client_r, mut client_w) = tokio::io::split(client);
        let mut lines = BufReader::new(client_r).lines();

        client_w.write_all(b"ping\n").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("Received ping")
        );

        session.stop().await;
        // writer shut down its side: client observes end-of-stream
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
