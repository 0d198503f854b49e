//! # Server: listener + signal watcher under one task group.
//!
//! The [`Server`] owns the event bus, the subscriber list, the session registry
//! and the root cancellation source. [`Server::run`] wires two sibling tasks into
//! a [`TaskGroup`] and returns the group's terminal condition.
//!
//! ## High-level architecture
//! ```text
//! run(handler)
//!   ├─ OsSignals::register(cfg.signals)  ── Err ─► RuntimeError::SignalSetup
//!   └─ run_with(endpoint, signals, handler)
//!        ├─ event pump: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!        ├─ TaskGroup (child of the root source, grace = cfg.grace)
//!        │    ├─ "listener": ListenerTask::run   (accept loop, drains registry on exit)
//!        │    └─ "signals":  SignalWatcher::listen (signal → clean-exit sentinel)
//!        ├─ group.wait()  ─► Ok(()) | Err(TaskFailed{first error})
//!        └─ flush pump, stop subscribers
//!
//! shutdown() ─► root.fire() ─► ShutdownRequested ─► every task sees cancellation
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use connvisor::{Acknowledge, Config, Server, Subscribe};
//! #[cfg(feature = "logging")]
//! use connvisor::LogWriter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!     #[cfg(feature = "logging")]
//!     subs.push(Arc::new(LogWriter::default()));
//!
//!     let server = Server::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     // Runs until SIGHUP/SIGQUIT/SIGTERM/SIGINT or a fatal listener error.
//!     server.run(Arc::new(Acknowledge)).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::cancel::CancelSource;
use crate::core::config::Config;
use crate::core::fault::FaultInjection;
use crate::core::group::TaskGroup;
use crate::core::listener::{Endpoint, ListenerTask};
use crate::core::signal::{OsSignals, SignalSource, SignalWatcher};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::session::{FrameHandler, SessionRegistry};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Name of the accept-loop task inside the group.
pub const LISTENER_TASK: &str = "listener";
/// Name of the signal-watcher task inside the group.
pub const SIGNAL_TASK: &str = "signals";

/// Builder for [`Server`].
pub struct ServerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    fault: FaultInjection,
}

impl ServerBuilder {
    /// Starts a builder with `cfg` and no subscribers.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            fault: FaultInjection::None,
        }
    }

    /// Sets the event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Injects a startup fault into the listener task.
    pub fn with_fault(mut self, fault: FaultInjection) -> Self {
        self.fault = fault;
        self
    }

    /// Builds the server.
    pub fn build(self) -> Server {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        Server {
            registry: SessionRegistry::new(bus.clone()),
            root: CancelSource::new(),
            cfg: self.cfg,
            subscribers: self.subscribers,
            fault: self.fault,
            bus,
        }
    }
}

/// Line-protocol server: one listener, one signal watcher, one registry.
pub struct Server {
    cfg: Config,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    root: CancelSource,
    fault: FaultInjection,
    registry: Arc<SessionRegistry>,
}

impl Server {
    /// Returns a builder.
    pub fn builder(cfg: Config) -> ServerBuilder {
        ServerBuilder::new(cfg)
    }

    /// Creates a server without subscribers.
    pub fn new(cfg: Config) -> Self {
        ServerBuilder::new(cfg).build()
    }

    /// Configuration in use.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared by every component of this server.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Live-session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Requests a clean shutdown of the current (or next) run.
    ///
    /// Idempotent. A server that was shut down stays shut down: a later `run`
    /// returns as soon as its tasks observe the cancellation.
    pub fn shutdown(&self) {
        if self.root.fire() {
            self.bus
                .publish(Event::new(EventKind::ShutdownRequested).with_reason("requested"));
        }
    }

    /// Listens on `cfg.listen_addr` and watches `cfg.signals` until a signal,
    /// [`shutdown`](Self::shutdown), or a fatal task error.
    pub async fn run(&self, handler: Arc<dyn FrameHandler>) -> Result<(), RuntimeError> {
        let signals = OsSignals::register(&self.cfg.signals).map_err(RuntimeError::SignalSetup)?;
        let endpoint = Endpoint::Addr(self.cfg.listen_addr.clone());
        self.run_with(endpoint, signals, handler).await
    }

    /// Like [`run`](Self::run) with an explicit endpoint and signal source.
    pub async fn run_with<S: SignalSource>(
        &self,
        endpoint: impl Into<Endpoint>,
        signals: S,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<(), RuntimeError> {
        let pump_stop = CancellationToken::new();
        let pump = self.spawn_pump(pump_stop.clone());

        let listener = ListenerTask::new(
            endpoint.into(),
            Arc::clone(&self.registry),
            handler,
            &self.cfg,
            self.bus.clone(),
        )
        .with_fault(self.fault.clone());
        let watcher = SignalWatcher::new(signals, self.bus.clone());

        let mut group = TaskGroup::with_cancel(
            CancelSource::with_parent(&self.root.token()),
            self.bus.clone(),
        )
        .with_grace(self.cfg.grace_limit());
        group.spawn(LISTENER_TASK, move |token| listener.run(token));
        group.spawn(SIGNAL_TASK, move |token| watcher.listen(token));

        let res = group.wait().await;

        pump_stop.cancel();
        let _ = pump.await;
        res
    }

    /// Forwards bus events to the subscribers until `stop`, then flushes what is
    /// still buffered and waits for every subscriber to drain its queue.
    fn spawn_pump(&self, stop: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            set.shutdown().await;
        })
    }
}
