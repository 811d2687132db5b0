//! Per-job bookkeeping: lifecycle state, cancellation token, progress sink.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};

use crate::model::{ProgressEvent, ResultType};

/// Lifecycle of one queued parameter.
///
/// `Queued → Dispatching → Running → Terminal`. A queued job canceled
/// before dispatch goes terminal directly and never reports a start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Dispatching,
    Running,
    Terminal(ResultType),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Terminal(_))
    }
}

/// Lock that shrugs off poisoning; job state stays usable even if a
/// worker panicked while holding it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cooperative cancellation signal shared between the orchestrator and a
/// job runner. Runners observe it at their own checkpoints; setting it
/// never preempts a job.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { inner: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    pub fn is_canceled(&self) -> bool {
        *self.inner.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.subscribe();
        // The sender lives in self, so wait_for can only fail if the
        // token is dropped mid-wait, and then nobody observes the result.
        let _ = rx.wait_for(|canceled| *canceled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The orchestrator's bookkeeping record for one queued parameter.
#[derive(Debug)]
pub(crate) struct JobHandle {
    pub name: String,
    pub state: Arc<Mutex<JobState>>,
    pub cancel: CancelToken,
}

impl JobHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(JobState::Queued)),
            cancel: CancelToken::new(),
        }
    }
}

/// Handed to a job runner for progress reporting. The first step moves
/// the job from `Dispatching` to `Running`.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    name: String,
    state: Arc<Mutex<JobState>>,
    event_tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink {
    pub(crate) fn new(
        name: String,
        state: Arc<Mutex<JobState>>,
        event_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Self {
        Self {
            name,
            state,
            event_tx,
        }
    }

    /// Report one completed step.
    pub fn step(&self) {
        {
            let mut st = lock(&self.state);
            if *st == JobState::Dispatching {
                *st = JobState::Running;
            }
        }
        let _ = self.event_tx.send(ProgressEvent::Step {
            name: self.name.clone(),
        });
    }
}
