//! # Listener task: accept loop feeding the session registry.
//!
//! ```text
//! run(token)
//!   ├─ fault.trigger()?                       (injected Error / Panic)
//!   ├─ bind(addr)  ── Err ─► TaskError::Io{"listen on … failed"}   (fatal)
//!   ├─ publish ListenerBound
//!   ├─ loop select!
//!   │    ├─ token.cancelled()  ─► break
//!   │    └─ accept()
//!   │         ├─ Ok(stream)    ─► LineTransport ─► ConnectionSession ─► registry.add
//!   │         └─ Err(e)        ─► AcceptFailed; sleep backoff (cancellable); retry
//!   ├─ drop socket ─► publish ListenerClosed
//!   └─ registry.shutdown_within(drain_grace) ─► Ok(())
//! ```
//!
//! ## Rules
//! - Bind errors end the task with an error; accept errors never do.
//! - The listening socket is closed before the drain starts, so no session is
//!   added while the registry shuts down.
//! - The task returns only after every session it accepted has stopped (or was
//!   aborted at the drain deadline).

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::core::backoff::AcceptBackoff;
use crate::core::config::Config;
use crate::core::fault::FaultInjection;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::session::{
    ConnectionSession, FrameHandler, LineTransport, SessionOptions, SessionRegistry,
};

/// Where the listener gets its socket from.
#[derive(Debug)]
pub enum Endpoint {
    /// Bind this address when the task starts.
    Addr(String),
    /// Use an already bound listener.
    Listener(TcpListener),
}

impl From<TcpListener> for Endpoint {
    fn from(l: TcpListener) -> Self {
        Endpoint::Listener(l)
    }
}

impl From<String> for Endpoint {
    fn from(a: String) -> Self {
        Endpoint::Addr(a)
    }
}

impl From<&str> for Endpoint {
    fn from(a: &str) -> Self {
        Endpoint::Addr(a.to_string())
    }
}

/// Accept loop that turns connections into registered sessions.
pub struct ListenerTask {
    endpoint: Endpoint,
    registry: Arc<SessionRegistry>,
    handler: Arc<dyn FrameHandler>,
    session: SessionOptions,
    max_frame_len: usize,
    backoff: AcceptBackoff,
    drain: Option<Duration>,
    fault: FaultInjection,
    bus: Bus,
}

impl ListenerTask {
    /// Creates a listener that registers sessions in `registry`.
    pub fn new(
        endpoint: Endpoint,
        registry: Arc<SessionRegistry>,
        handler: Arc<dyn FrameHandler>,
        cfg: &Config,
        bus: Bus,
    ) -> Self {
        Self {
            endpoint,
            registry,
            handler,
            session: cfg.session_options(),
            max_frame_len: cfg.max_frame_len,
            backoff: cfg.accept_backoff,
            drain: cfg.drain_limit(),
            fault: FaultInjection::None,
            bus,
        }
    }

    /// Injects a startup fault.
    pub fn with_fault(mut self, fault: FaultInjection) -> Self {
        self.fault = fault;
        self
    }

    /// Runs until `token` is cancelled, then drains the registry.
    pub async fn run(self, token: CancellationToken) -> Result<(), TaskError> {
        self.fault.trigger()?;

        let listener = match self.endpoint {
            Endpoint::Listener(l) => l,
            Endpoint::Addr(ref addr) => TcpListener::bind(addr.as_str())
                .await
                .map_err(|e| TaskError::io(format!("listen on {addr} failed"), e))?,
        };

        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        self.bus
            .publish(Event::new(EventKind::ListenerBound).with_peer(local.as_str()));

        let mut failures = 0u32;
        loop {
            let accepted = tokio::select! {
                _ = token.cancelled() => break,
                res = listener.accept() => res,
            };

            match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    let transport =
                        LineTransport::new(stream, peer.to_string(), self.max_frame_len);
                    let session = ConnectionSession::from_transport(
                        transport,
                        Arc::clone(&self.handler),
                        self.session.clone(),
                        self.bus.clone(),
                    );
                    self.registry.add(session).await;
                }
                Err(_) if token.is_cancelled() => break,
                Err(e) => {
                    let delay = self.backoff.delay(failures);
                    failures = failures.saturating_add(1);
                    self.bus.publish(
                        Event::new(EventKind::AcceptFailed)
                            .with_reason(e.to_string())
                            .with_timeout(delay),
                    );
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        drop(listener);
        self.bus
            .publish(Event::new(EventKind::ListenerClosed).with_peer(local));

        self.registry.shutdown_within(self.drain).await;
        Ok(())
    }
}
