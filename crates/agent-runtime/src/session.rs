//! Session runtime and registry
//!
//! A `SessionRuntime` owns the in-flight execution (if any) and the current
//! event log for one session. Admission is single-flight: `begin` atomically
//! rejects a second execution while one is running. The `SessionRegistry`
//! maps session ids to runtimes, creating them lazily and evicting idle
//! ones on a timer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, RuntimeError};
use crate::log::EventLog;

/// Runtime state for one session
#[derive(Debug)]
pub struct SessionRuntime {
    /// Session this runtime belongs to
    pub session_id: Uuid,
    inner: Mutex<RuntimeInner>,
}

#[derive(Debug)]
struct RuntimeInner {
    /// Set between `begin` and `finish`
    in_flight: bool,
    /// Handle of the running execution; taken by `cancel`
    task: Option<JoinHandle<()>>,
    /// Cancel signal for the running execution
    cancel_tx: Option<oneshot::Sender<()>>,
    /// Log of the current (or most recent) execution
    log: Option<Arc<EventLog>>,
    last_active: Instant,
}

impl SessionRuntime {
    /// Create a runtime with no execution in flight
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            inner: Mutex::new(RuntimeInner {
                in_flight: false,
                task: None,
                cancel_tx: None,
                log: None,
                last_active: Instant::now(),
            }),
        }
    }

    /// Check whether an execution is in flight
    pub fn is_busy(&self) -> bool {
        self.inner.lock().unwrap().is_busy()
    }

    /// Atomically admit and spawn a new execution
    ///
    /// Creates a fresh event log and cancel channel, hands both to `f`, and
    /// spawns the returned future. Fails with `AgentBusy` while a previous
    /// execution has not finished; the check and the spawn happen under one
    /// lock so concurrent admission attempts cannot both win.
    pub fn begin<F, Fut>(&self, f: F) -> Result<Arc<EventLog>>
    where
        F: FnOnce(Arc<EventLog>, oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if inner.is_busy() {
            return Err(RuntimeError::AgentBusy {
                session_id: self.session_id.to_string(),
            });
        }

        let log = Arc::new(EventLog::new());
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(f(Arc::clone(&log), cancel_rx));

        inner.in_flight = true;
        inner.task = Some(handle);
        inner.cancel_tx = Some(cancel_tx);
        inner.log = Some(Arc::clone(&log));
        inner.last_active = Instant::now();

        debug!("Started execution for session {}", self.session_id);
        Ok(log)
    }

    /// Cancel the in-flight execution and wait for it to unwind
    ///
    /// Returns `false` when nothing was running. The caller observes the
    /// cancellation: this resolves only after the execution has taken its
    /// cancellation path and closed the event log.
    pub async fn cancel(&self) -> bool {
        let (cancel_tx, task) = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.is_busy() {
                return false;
            }
            (inner.cancel_tx.take(), inner.task.take())
        };

        if let Some(tx) = cancel_tx {
            let _ = tx.send(());
        }
        if let Some(handle) = task {
            let _ = handle.await;
        }

        debug!("Cancelled execution for session {}", self.session_id);
        true
    }

    /// Mark the current execution finished
    ///
    /// Called by the execution itself on every terminal path. The event log
    /// stays attached so late readers can still replay the finished run.
    pub fn finish(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.in_flight = false;
        inner.task = None;
        inner.cancel_tx = None;
        inner.last_active = Instant::now();
    }

    /// Log of the current (or most recent) execution
    pub fn event_log(&self) -> Option<Arc<EventLog>> {
        self.inner.lock().unwrap().log.clone()
    }

    /// Time since the runtime last started or finished an execution
    pub fn idle_for(&self) -> Duration {
        self.inner.lock().unwrap().last_active.elapsed()
    }
}

impl RuntimeInner {
    fn is_busy(&self) -> bool {
        // A taken handle (cancel in progress) still counts as busy until
        // the execution calls `finish`; a panicked task does not.
        self.in_flight
            && self
                .task
                .as_ref()
                .map(|task| !task.is_finished())
                .unwrap_or(true)
    }
}

/// Process-wide map from session id to runtime
///
/// Constructed once at startup and injected wherever session lookup is
/// needed. Runtimes are created lazily on first use and reclaimed by
/// `sweep_idle`; a swept session is rebuilt on its next message.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Arc<SessionRuntime>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the runtime for a session, creating it if absent
    pub fn get_or_create(&self, session_id: Uuid) -> Arc<SessionRuntime> {
        let mut sessions = self.sessions.lock().unwrap();
        Arc::clone(
            sessions
                .entry(session_id)
                .or_insert_with(|| Arc::new(SessionRuntime::new(session_id))),
        )
    }

    /// Get the runtime for a session if one exists
    pub fn get(&self, session_id: Uuid) -> Option<Arc<SessionRuntime>> {
        self.sessions.lock().unwrap().get(&session_id).cloned()
    }

    /// Number of live runtimes
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Drop runtimes with no execution in flight that have been inactive
    /// longer than `max_idle`; returns how many were removed
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, runtime| runtime.is_busy() || runtime.idle_for() < max_idle);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Swept {} idle session runtime(s)", removed);
        }
        removed
    }
}
