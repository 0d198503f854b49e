//! # Signal watcher: host signals as a clean-exit trigger.
//!
//! [`SignalWatcher`] is the sibling task that turns "the operator asked us to
//! stop" into the group's clean-exit sentinel. It waits on a [`SignalSource`]
//! and on the group's cancellation token, whichever completes first:
//!
//! ```text
//! listen(token)
//!   ├─ source.recv() → Some(sig) ─► publish SignalReceived
//!   │                              └► Err(TaskError::Exited{"signal SIGTERM"})  (group: clean exit)
//!   ├─ source.recv() → None      ─► source can't deliver; wait for token → Ok(())
//!   └─ token.cancelled()         ─► someone else drives shutdown → Ok(())
//! ```
//!
//! The source is owned by the watcher and dropped when `listen` returns, which
//! removes the OS-level subscription on either exit path.
//!
//! ## Sources
//! - [`OsSignals`]: real host signals via `tokio::signal`.
//!   **Unix:** any of [`Signal`]'s variants. **Windows:** only Ctrl-C, regardless of the list.
//! - `tokio::sync::mpsc::Receiver<Signal>`: programmatic trigger (tests, admin hooks).

use std::fmt;
use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};

/// Host signals the runtime knows how to watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGHUP`
    Hangup,
    /// `SIGINT` (Ctrl-C in terminal)
    Interrupt,
    /// `SIGQUIT`
    Quit,
    /// `SIGTERM` (default kill signal, used by systemd/Kubernetes)
    Terminate,
    /// `SIGUSR1`
    User1,
    /// `SIGUSR2`
    User2,
}

impl Signal {
    /// Conventional signal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Hangup => "SIGHUP",
            Signal::Interrupt => "SIGINT",
            Signal::Quit => "SIGQUIT",
            Signal::Terminate => "SIGTERM",
            Signal::User1 => "SIGUSR1",
            Signal::User2 => "SIGUSR2",
        }
    }

    /// The default termination set: HUP, QUIT, TERM, INT.
    pub fn termination() -> Vec<Signal> {
        vec![
            Signal::Hangup,
            Signal::Quit,
            Signal::Terminate,
            Signal::Interrupt,
        ]
    }

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;
        match self {
            Signal::Hangup => SignalKind::hangup(),
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Quit => SignalKind::quit(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::User1 => SignalKind::user_defined1(),
            Signal::User2 => SignalKind::user_defined2(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that delivers "a signal arrived".
#[async_trait]
pub trait SignalSource: Send + 'static {
    /// Waits for the next signal. `None` means the source can no longer deliver.
    async fn recv(&mut self) -> Option<Signal>;
}

#[async_trait]
impl SignalSource for mpsc::Receiver<Signal> {
    async fn recv(&mut self) -> Option<Signal> {
        mpsc::Receiver::recv(self).await
    }
}

/// Host signal subscriptions, installed at construction and removed on drop.
#[derive(Debug)]
pub struct OsSignals {
    #[cfg(unix)]
    streams: Vec<(Signal, tokio::signal::unix::Signal)>,
}

impl OsSignals {
    /// Installs handlers for `signals`.
    ///
    /// Must be called from within a tokio runtime. Once this returns, the listed
    /// signals no longer trigger their default disposition.
    #[cfg(unix)]
    pub fn register(signals: &[Signal]) -> io::Result<Self> {
        let mut streams = Vec::with_capacity(signals.len());
        for &sig in signals {
            streams.push((sig, tokio::signal::unix::signal(sig.kind())?));
        }
        Ok(Self { streams })
    }

    /// Installs a Ctrl-C handler; the list is ignored on this platform.
    #[cfg(not(unix))]
    pub fn register(_signals: &[Signal]) -> io::Result<Self> {
        Ok(Self {})
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<Signal> {
        if self.streams.is_empty() {
            return None;
        }
        let waits = self.streams.iter_mut().map(|(sig, stream)| {
            let sig = *sig;
            Box::pin(async move { stream.recv().await.map(|()| sig) })
        });
        let (got, _, _) = futures::future::select_all(waits).await;
        got
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<Signal> {
        tokio::signal::ctrl_c().await.ok().map(|()| Signal::Interrupt)
    }
}

/// Sibling task that ends the run when a host signal arrives.
pub struct SignalWatcher<S> {
    source: S,
    bus: Bus,
}

impl<S: SignalSource> SignalWatcher<S> {
    /// Creates a watcher over an already-registered source.
    pub fn new(source: S, bus: Bus) -> Self {
        Self { source, bus }
    }

    /// Blocks until a signal arrives (clean-exit sentinel) or `token` fires (`Ok`).
    pub async fn listen(mut self, token: CancellationToken) -> Result<(), TaskError> {
        tokio::select! {
            sig = self.source.recv() => match sig {
                Some(sig) => {
                    self.bus.publish(Event::new(EventKind::SignalReceived).with_reason(sig.as_str()));
                    Err(TaskError::Exited { reason: format!("signal {sig}") })
                }
                None => {
                    token.cancelled().await;
                    Ok(())
                }
            },
            _ = token.cancelled() => Ok(()),
        }
    }
}
