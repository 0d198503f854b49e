//! # Session registry: the set of live connections.
//!
//! The registry owns every started [`ConnectionSession`] and is the single place
//! that stops them when the listener winds down.
//!
//! ## Architecture
//! ```text
//! listener ─► add(session) ─► sessions[id] = session
//!                 ├─► session.start()
//!                 └─► reaper (TaskTracker): finished() → stop() → remove(id)
//!
//! shutdown_within(grace)
//!   loop: snapshot map ─► DrainStarted
//!         stop all concurrently, remove each once stopped
//!                                ├─ all done      ─► DrainCompleted
//!                                └─ grace expired ─► abort + remove leftovers ─► DrainTimedOut
//!   until map is empty; then wait for every reaper.
//! ```
//!
//! ## Rules
//! - A session leaves the map only after it reached `Stopped`; removing an
//!   absent id is a no-op.
//! - `shutdown` keeps draining until the map is observed empty, so a session
//!   added while a drain is in progress is still stopped.
//! - The registry never holds its lock across a session stop.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;

use crate::events::{Bus, Event, EventKind};
use crate::session::session::{ConnectionSession, SessionId, SessionState};

/// Concurrent map of live sessions keyed by [`SessionId`].
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<ConnectionSession>>>,
    reapers: TaskTracker,
    bus: Bus,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            reapers: TaskTracker::new(),
            bus,
        })
    }

    /// Registers and starts `session`.
    ///
    /// The session is removed automatically once it finishes on its own
    /// (peer hang-up, terminal read error).
    pub async fn add(self: &Arc<Self>, session: Arc<ConnectionSession>) {
        let id = session.id();
        self.sessions.write().await.insert(id, Arc::clone(&session));
        session.start();

        let registry: Weak<Self> = Arc::downgrade(self);
        self.reapers.spawn(async move {
            session.finished().await;
            session.stop().await;
            if let Some(registry) = registry.upgrade() {
                registry.remove(id).await;
            }
        });
    }

    /// Removes the session with `id`, returning it if present.
    pub async fn remove(&self, id: SessionId) -> Option<Arc<ConnectionSession>> {
        self.sessions.write().await.remove(&id)
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Returns sorted ids of live sessions.
    pub async fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Stops every session and waits for each to finish.
    pub async fn shutdown(&self) {
        self.shutdown_within(None).await;
    }

    /// Stops every session, aborting those still running after `grace`.
    ///
    /// Returns `false` if any batch had to be aborted.
    pub async fn shutdown_within(&self, grace: Option<Duration>) -> bool {
        let mut clean = true;

        loop {
            let batch: Vec<Arc<ConnectionSession>> =
                self.sessions.read().await.values().cloned().collect();
            if batch.is_empty() {
                break;
            }

            self.bus.publish(
                Event::new(EventKind::DrainStarted).with_reason(format!("{} sessions", batch.len())),
            );

            let stops = join_all(batch.iter().map(|s| async move {
                s.stop().await;
                self.remove(s.id()).await;
            }));
            let drained = match grace {
                Some(g) => tokio::time::timeout(g, stops).await.is_ok(),
                None => {
                    stops.await;
                    true
                }
            };

            if drained {
                self.bus.publish(Event::new(EventKind::DrainCompleted));
                continue;
            }

            clean = false;
            let mut stuck = 0usize;
            for s in &batch {
                if s.state() != SessionState::Stopped {
                    s.abort();
                    stuck += 1;
                }
                self.remove(s.id()).await;
            }
            let mut ev = Event::new(EventKind::DrainTimedOut)
                .with_reason(format!("{stuck} sessions aborted"));
            if let Some(g) = grace {
                ev = ev.with_timeout(g);
            }
            self.bus.publish(ev);
        }

        self.reapers.close();
        self.reapers.wait().await;
        self.reapers.reopen();
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::session::handler::Acknowledge;
    use crate::session::session::SessionOptions;
    use crate::session::transport::{Frame, FrameRead, FrameWrite, LineTransport};
    use async_trait::async_trait;
    use std::io;
    use tokio::io::AsyncWriteExt;

    fn duplex_session(bus: &Bus) -> (Arc<ConnectionSession>, tokio::io::DuplexStream) {
        let (server, client) = tokio::io::duplex(256);
        let session = ConnectionSession::from_transport(
            LineTransport::new(server, "duplex", 256),
            Arc::new(Acknowledge),
            SessionOptions::default(),
            bus.clone(),
        );
        (session, client)
    }

    #[tokio::test]
    async fn shutdown_stops_everything_and_empties_registry() {
        let bus = Bus::new(256);
        let registry = SessionRegistry::new(bus.clone());
        let mut clients = Vec::new();
        for _ in 0..10 {
            let (s, c) = duplex_session(&bus);
            registry.add(s).await;
            clients.push(c);
        }
        assert_eq!(registry.len().await, 10);
        assert_eq!(registry.ids().await.len(), 10);

        assert!(registry.shutdown_within(Some(Duration::from_secs(2))).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn session_removes_itself_on_peer_hangup() {
        let bus = Bus::new(64);
        let registry = SessionRegistry::new(bus.clone());
        let (s, mut client) = duplex_session(&bus);
        let id = s.id();
        registry.add(s).await;

        client.shutdown().await.unwrap();
        drop(client);

        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.ids().await.contains(&id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session reaped after hang-up");
        assert!(registry.remove(id).await.is_none());
    }

    /// Reader with nothing to say; only the closed-flag ends it.
    struct Silent;

    #[async_trait]
    impl FrameRead for Silent {
        async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
            std::future::pending().await
        }
    }

    /// Writer whose writes and close never complete.
    struct Hanging;

    #[async_trait]
    impl FrameWrite for Hanging {
        async fn write_frame(&mut self, _: &[u8]) -> io::Result<()> {
            std::future::pending().await
        }
        async fn close(&mut self) -> io::Result<()> {
            std::future::pending().await
        }
    }

    /// Writer that takes a while to close.
    struct SlowClose;

    #[async_trait]
    impl FrameWrite for SlowClose {
        async fn write_frame(&mut self, _: &[u8]) -> io::Result<()> {
            Ok(())
        }
        async fn close(&mut self) -> io::Result<()> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn draining_session_stays_registered_until_stopped() {
        let bus = Bus::new(64);
        let registry = SessionRegistry::new(bus.clone());
        let session = ConnectionSession::new(
            "slow",
            Silent,
            SlowClose,
            Arc::new(Acknowledge),
            SessionOptions::default(),
            bus,
        );
        let id = session.id();
        registry.add(Arc::clone(&session)).await;

        let drain = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.shutdown().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(session.state(), SessionState::Stopping);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.ids().await, vec![id]);

        tokio::time::timeout(Duration::from_secs(2), drain)
            .await
            .expect("drain completes")
            .unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn bounded_drain_aborts_stuck_sessions() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let registry = SessionRegistry::new(bus.clone());

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Option<Frame>, FrameError>>();
        struct Fed(tokio::sync::mpsc::UnboundedReceiver<Result<Option<Frame>, FrameError>>);
        #[async_trait]
        impl FrameRead for Fed {
            async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
                match self.0.recv().await {
                    Some(step) => step,
                    None => std::future::pending().await,
                }
            }
        }

        // A frame is in flight to a writer that never completes.
        let stuck = ConnectionSession::new(
            "stuck",
            Fed(rx),
            Hanging,
            Arc::new(Acknowledge),
            SessionOptions::default(),
            bus.clone(),
        );
        let idle = ConnectionSession::new(
            "idle",
            Silent,
            Hanging,
            Arc::new(Acknowledge),
            SessionOptions::default(),
            bus.clone(),
        );
        registry.add(Arc::clone(&stuck)).await;
        registry.add(idle).await;
        tx.send(Ok(Some(b"x".to_vec()))).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let clean = registry
            .shutdown_within(Some(Duration::from_millis(50)))
            .await;

        assert!(!clean);
        assert!(registry.is_empty().await);
        assert_eq!(stuck.state(), SessionState::Stopped);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert!(kinds.contains(&EventKind::DrainStarted));
        assert!(kinds.contains(&EventKind::DrainTimedOut));
        assert!(!kinds.contains(&EventKind::DrainCompleted));
    }

    #[tokio::test]
    async fn shutdown_of_empty_registry_is_immediate() {
        let registry = SessionRegistry::new(Bus::new(8));
        assert!(registry.shutdown_within(Some(Duration::from_millis(1))).await);
        registry.shutdown().await;
    }
}
