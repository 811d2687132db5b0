//! Parameter orchestration: scheduling, lifecycle, and classification.
//!
//! This module owns the run lifecycle. Presentation layers queue
//! parameters, dispatch, and drain the event stream; job runners are
//! invoked on worker tasks bounded by the concurrency budget.

mod classify;
mod job;
mod manager;

pub use classify::classify;
pub use job::{CancelToken, JobState, ProgressSink};
pub use manager::Orchestrator;

#[cfg(test)]
pub(crate) fn test_sink(
    name: &str,
) -> (
    ProgressSink,
    tokio::sync::mpsc::UnboundedReceiver<crate::model::ProgressEvent>,
) {
    use std::sync::{Arc, Mutex};

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let state = Arc::new(Mutex::new(JobState::Dispatching));
    (ProgressSink::new(name.to_string(), state, tx), rx)
}
