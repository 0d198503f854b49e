//! # TaskGroup: fan-out/fan-in of sibling tasks with first-error-wins.
//!
//! A [`TaskGroup`] runs a handful of long-lived, fallible tasks (listener, signal
//! watcher, ...) that share one [`CancelSource`]. The first task to return an
//! error, or the clean-exit sentinel, fires the source so every sibling starts
//! shutting down; [`TaskGroup::wait`] then joins everything and reports one
//! terminal condition.
//!
//! ## Flow
//! ```text
//! spawn("listener", f) ──► JoinSet ──► catch_fault(f(token)) ──┐
//! spawn("signals",  g) ──► JoinSet ──► catch_fault(g(token)) ──┤
//!                                                              ▼
//! wait():  join_next ─► Ok(())                 → TaskStopped
//!                    ─► Err(Exited{..})        → TaskStopped, fire()
//!                    ─► Err(e)                 → TaskFailed/TaskPanicked, fire(),
//!                                                 first-error slot (if empty)
//!          once fired and grace > 0: deadline; on expiry abort the rest → GraceExceeded
//!          all joined ─► Ok(()) | Err(RuntimeError::TaskFailed{first})
//! ```
//!
//! ## Rules
//! - The first-error slot is write-once; later failures are only reported as events.
//! - The clean-exit sentinel cancels siblings but never fills the slot.
//! - A panic anywhere inside a task is caught at the task boundary and becomes
//!   [`TaskError::Panicked`] with the panic message and the backtrace of the
//!   panic site (captured by a chained panic hook while the task is polled).
//! - Grace expiry is not a failure: the stuck tasks are aborted and the result is
//!   decided by the first-error slot alone.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::cancel::CancelSource;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};

/// Supervisor for a set of sibling tasks sharing one cancellation source.
///
/// # Example
/// ```rust
/// use connvisor::{Bus, TaskError, TaskGroup};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut group = TaskGroup::new(Bus::default());
///
/// group.spawn("worker", |token| async move {
///     token.cancelled().await;
///     Ok(())
/// });
/// group.spawn("quitter", |_token| async move {
///     Err(TaskError::Exited { reason: "done".into() })
/// });
///
/// // The sentinel fires cancellation, the worker returns, and nothing failed.
/// assert!(group.wait().await.is_ok());
/// # }
/// ```
pub struct TaskGroup {
    cancel: CancelSource,
    set: JoinSet<(Arc<str>, Result<(), TaskError>)>,
    running: HashMap<Arc<str>, usize>,
    bus: Bus,
    grace: Option<Duration>,
}

impl TaskGroup {
    /// Creates a group with its own cancellation source and unbounded shutdown.
    pub fn new(bus: Bus) -> Self {
        Self::with_cancel(CancelSource::new(), bus)
    }

    /// Creates a group around an existing cancellation source.
    pub fn with_cancel(cancel: CancelSource, bus: Bus) -> Self {
        Self {
            cancel,
            set: JoinSet::new(),
            running: HashMap::new(),
            bus,
            grace: None,
        }
    }

    /// Bounds how long `wait` lets tasks run after cancellation fired (`None` = unbounded).
    pub fn with_grace(mut self, grace: Option<Duration>) -> Self {
        self.grace = grace.filter(|g| *g > Duration::ZERO);
        self
    }

    /// The shared cancellation source.
    pub fn cancel_source(&self) -> &CancelSource {
        &self.cancel
    }

    /// Number of tasks not yet joined.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// True if no task is pending.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Spawns a task that receives the group's cancellation token.
    ///
    /// `f` itself is invoked inside the task, so a panic while building the
    /// future is caught like any other.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<Arc<str>>, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let name: Arc<str> = name.into();
        let token = self.cancel.token();
        let task_name = Arc::clone(&name);

        self.bus
            .publish(Event::new(EventKind::TaskStarting).with_task(Arc::clone(&name)));
        *self.running.entry(name).or_default() += 1;
        self.set.spawn(async move {
            let res = catch_fault(async move { f(token).await }).await;
            (task_name, res)
        });
    }

    /// Waits for every task, then returns the first failure (if any).
    pub async fn wait(mut self) -> Result<(), RuntimeError> {
        let cancel = self.cancel.clone();
        let grace = self.grace;
        let mut first: Option<(Arc<str>, TaskError)> = None;
        let mut deadline: Option<Instant> = None;
        let mut timed_out = false;

        loop {
            let grace_armed = grace.is_some() && deadline.is_none();

            let joined = tokio::select! {
                joined = self.set.join_next() => joined,
                _ = cancel.fired(), if grace_armed => {
                    deadline = grace.map(|g| Instant::now() + g);
                    continue;
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    timed_out = true;
                    break;
                }
            };

            match joined {
                None => break,
                Some(Ok((name, res))) => {
                    self.finished(&name);
                    self.record(name, res, &mut first);
                }
                Some(Err(join_err)) => {
                    if let Some(err) = join_error_to_task_error(join_err) {
                        self.record(Arc::from("unknown"), Err(err), &mut first);
                    }
                }
            }
        }

        if timed_out {
            self.abort_stuck().await;
        }

        match first {
            None => Ok(()),
            Some((task, source)) => Err(RuntimeError::TaskFailed {
                task: task.to_string(),
                source,
            }),
        }
    }

    fn finished(&mut self, name: &Arc<str>) {
        if let Some(n) = self.running.get_mut(name) {
            *n -= 1;
            if *n == 0 {
                self.running.remove(name);
            }
        }
    }

    /// Classifies one task result, fires cancellation when needed, fills the slot.
    fn record(
        &self,
        name: Arc<str>,
        res: Result<(), TaskError>,
        first: &mut Option<(Arc<str>, TaskError)>,
    ) {
        let err = match res {
            Ok(()) => {
                self.bus
                    .publish(Event::new(EventKind::TaskStopped).with_task(name));
                return;
            }
            Err(err) => err,
        };

        let kind = match &err {
            TaskError::Exited { .. } => EventKind::TaskStopped,
            TaskError::Panicked { .. } => EventKind::TaskPanicked,
            _ => EventKind::TaskFailed,
        };
        self.bus.publish(
            Event::new(kind)
                .with_task(Arc::clone(&name))
                .with_reason(err.to_string()),
        );

        if self.cancel.fire() {
            self.bus.publish(
                Event::new(EventKind::ShutdownRequested)
                    .with_task(Arc::clone(&name))
                    .with_reason(err.as_label()),
            );
        }

        if !err.is_clean_exit() && first.is_none() {
            *first = Some((name, err));
        }
    }

    /// Aborts every task still running after the grace period.
    async fn abort_stuck(&mut self) {
        let mut stuck: Vec<&str> = self.running.keys().map(|n| n.as_ref()).collect();
        stuck.sort_unstable();

        let mut ev = Event::new(EventKind::GraceExceeded).with_reason(stuck.join(","));
        if let Some(grace) = self.grace {
            ev = ev.with_timeout(grace);
        }
        self.bus.publish(ev);

        self.set.abort_all();
        while self.set.join_next().await.is_some() {}
        self.running.clear();
    }
}

thread_local! {
    /// Depth of `catch_fault` polls on this thread.
    static GUARDED: Cell<u32> = const { Cell::new(0) };
    /// Backtrace taken by the hook for the boundary to pick up.
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chains a hook that records the panic-site backtrace while a guarded poll runs.
fn install_trace_hook() {
    HOOK.call_once(|| {
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if GUARDED.with(|g| g.get()) > 0 {
                let trace = Backtrace::force_capture().to_string();
                PANIC_TRACE.with(|t| *t.borrow_mut() = Some(trace));
            }
            prev(info);
        }));
    });
}

/// Marks the current thread as polling a guarded task until dropped (also on unwind).
struct Guarded;

impl Guarded {
    fn enter() -> Self {
        GUARDED.with(|g| {
            if g.get() == 0 {
                PANIC_TRACE.with(|t| t.borrow_mut().take());
            }
            g.set(g.get() + 1);
        });
        Guarded
    }
}

impl Drop for Guarded {
    fn drop(&mut self) {
        GUARDED.with(|g| g.set(g.get().saturating_sub(1)));
    }
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|t| t.borrow_mut().take())
}

/// Runs `fut`, converting a panic into [`TaskError::Panicked`].
pub(crate) async fn catch_fault<F>(fut: F) -> Result<(), TaskError>
where
    F: Future<Output = Result<(), TaskError>>,
{
    install_trace_hook();

    let mut fut = std::pin::pin!(fut);
    let guarded = std::future::poll_fn(|cx| {
        let _guard = Guarded::enter();
        fut.as_mut().poll(cx)
    });

    match AssertUnwindSafe(guarded).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(TaskError::Panicked {
            message: panic_message(payload.as_ref()),
            backtrace: take_panic_trace()
                .unwrap_or_else(|| Backtrace::force_capture().to_string()),
        }),
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn join_error_to_task_error(err: JoinError) -> Option<TaskError> {
    if err.is_panic() {
        let payload = err.into_panic();
        Some(TaskError::Panicked {
            message: panic_message(payload.as_ref()),
            backtrace: String::new(),
        })
    } else {
        // aborted by us
        None
    }
}
