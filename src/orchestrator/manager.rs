//! Parameter orchestration engine.
//!
//! Owns the lifecycle of a characterization run: queues named
//! parameters, dispatches job runners under the concurrency budget,
//! relays lifecycle events, supports cancellation, and collects the
//! terminal result of every queued parameter.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::datasheet::Datasheet;
use crate::error::Error;
use crate::model::{ParameterDef, ProgressEvent, ResultRecord, ResultType, RuntimeOptions};
use crate::netlist::{self, AvailableSources, ConcreteSource};
use crate::orchestrator::classify;
use crate::orchestrator::job::{lock, CancelToken, JobHandle, JobState, ProgressSink};
use crate::rundir::{self, RunDirManager};
use crate::runner::JobRunner;

/// State shared between the orchestrator handle, the scheduler task, and
/// the job tasks. Lock order is slots, then a job's state, then results.
struct Shared {
    slots: Mutex<Vec<JobHandle>>,
    results: Mutex<BTreeMap<String, ResultRecord>>,
    event_tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl Shared {
    /// Move a job to its terminal state, record the result, and emit the
    /// terminal event. Returns false if the job was already terminal, in
    /// which case nothing is recorded or emitted.
    fn finish(&self, name: &str, state: &Mutex<JobState>, record: ResultRecord) -> bool {
        {
            let mut st = lock(state);
            if st.is_terminal() {
                return false;
            }
            *st = JobState::Terminal(record.result_type);
        }
        let event = match record.result_type {
            ResultType::Canceled => ProgressEvent::Canceled {
                name: name.to_string(),
            },
            result => ProgressEvent::Ended {
                name: name.to_string(),
                result,
            },
        };
        lock(&self.results).insert(name.to_string(), record);
        let _ = self.event_tx.send(event);
        true
    }
}

/// The parameter orchestration engine.
///
/// Callers queue parameters, dispatch the run, optionally cancel, join,
/// and then read the result table. Lifecycle events stream over the
/// channel returned by [`Orchestrator::new`].
pub struct Orchestrator {
    datasheet: Arc<Datasheet>,
    options: RuntimeOptions,
    runner: Arc<dyn JobRunner>,
    rundir: RunDirManager,
    shared: Arc<Shared>,
    scheduler: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Create an orchestrator and the event stream its run will feed.
    pub fn new(
        datasheet: Datasheet,
        options: RuntimeOptions,
        run_path: impl Into<PathBuf>,
        runner: Arc<dyn JobRunner>,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let rundir = RunDirManager::new(run_path, options.max_runs);
        let orchestrator = Self {
            datasheet: Arc::new(datasheet),
            options,
            runner,
            rundir,
            shared: Arc::new(Shared {
                slots: Mutex::new(Vec::new()),
                results: Mutex::new(BTreeMap::new()),
                event_tx,
            }),
            scheduler: None,
        };
        (orchestrator, event_rx)
    }

    pub fn datasheet(&self) -> &Datasheet {
        &self.datasheet
    }

    /// Register a parameter for execution in the current run.
    ///
    /// Re-queueing a still-pending parameter re-registers it at the back
    /// of the queue; re-queueing one that already started is ignored.
    /// Queueing a terminal parameter after the previous run was joined
    /// resets it for the next run.
    pub fn queue(&mut self, name: &str) -> Result<(), Error> {
        self.datasheet.get(name)?;
        let running = self.scheduler.is_some();
        let mut slots = lock(&self.shared.slots);

        match slots.iter().position(|s| s.name == name) {
            Some(pos) => {
                let state = *lock(&slots[pos].state);
                match state {
                    JobState::Queued => {
                        if !running {
                            let handle = slots.remove(pos);
                            slots.push(handle);
                        }
                    }
                    JobState::Terminal(_) if !running => {
                        slots.remove(pos);
                        lock(&self.shared.results).remove(name);
                        slots.push(JobHandle::new(name));
                        debug!("parameter {name}: re-queued for a new run");
                    }
                    _ => {
                        warn!("parameter {name} already started; queue request ignored");
                    }
                }
            }
            None => {
                if running {
                    return Err(Error::AlreadyRunning);
                }
                slots.push(JobHandle::new(name));
                debug!("parameter {name}: queued");
            }
        }
        Ok(())
    }

    /// Number of parameters currently waiting for dispatch.
    pub fn queued(&self) -> usize {
        lock(&self.shared.slots)
            .iter()
            .filter(|s| *lock(&s.state) == JobState::Queued)
            .count()
    }

    /// Begin asynchronous execution of all queued parameters. Returns
    /// the run directory; never blocks on job completion.
    pub fn dispatch(&mut self) -> Result<PathBuf, Error> {
        if self.scheduler.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let run_dir = self.rundir.prepare(self.options.force)?;

        let permits = if self.options.sequential {
            1
        } else {
            self.options.parallel_parameters.max(1)
        };
        let available = AvailableSources::probe(&self.datasheet.root, &self.datasheet.paths);
        info!(
            "dispatching {} parameters ({} in parallel) into {}",
            self.queued(),
            permits,
            run_dir.display()
        );

        let shared = self.shared.clone();
        let datasheet = self.datasheet.clone();
        let runner = self.runner.clone();
        let options = self.options.clone();
        let requested = self.options.netlist_source;
        let dir = run_dir.clone();

        self.scheduler = Some(tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(permits));
            let mut tasks = Vec::new();

            loop {
                // Next pending job in insertion order.
                let next = {
                    let slots = lock(&shared.slots);
                    slots.iter().find_map(|s| {
                        (*lock(&s.state) == JobState::Queued)
                            .then(|| (s.name.clone(), s.state.clone(), s.cancel.clone()))
                    })
                };
                let Some((name, state, cancel)) = next else {
                    break;
                };

                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };

                // The job may have been canceled while waiting for a
                // worker slot; cancel() already went terminal then.
                {
                    let mut st = lock(&state);
                    if *st != JobState::Queued {
                        continue;
                    }
                    *st = JobState::Dispatching;
                }

                let def = match datasheet.get(&name) {
                    Ok(d) => d.clone(),
                    Err(e) => {
                        shared.finish(&name, &state, ResultRecord::fault(e.to_string(), None));
                        continue;
                    }
                };
                let resolved = netlist::resolve_source(requested, available);
                debug!(
                    "parameter {name}: dispatched (netlist source {})",
                    resolved.map_or_else(|| "none".to_string(), |s| s.to_string())
                );

                tasks.push(tokio::spawn(run_job(
                    shared.clone(),
                    runner.clone(),
                    def,
                    options.clone(),
                    dir.clone(),
                    name,
                    state,
                    cancel,
                    resolved,
                    permit,
                )));
            }

            join_all(tasks).await;

            // A job task that died without reporting leaves its slot
            // non-terminal; account for it so join() callers still see
            // one terminal result per queued parameter.
            let stuck: Vec<_> = {
                let slots = lock(&shared.slots);
                slots
                    .iter()
                    .filter(|s| !lock(&s.state).is_terminal())
                    .map(|s| (s.name.clone(), s.state.clone()))
                    .collect()
            };
            for (name, state) in stuck {
                warn!("parameter {name}: job task ended without a result");
                shared.finish(
                    &name,
                    &state,
                    ResultRecord::fault("job task ended without a result", None),
                );
            }
        }));

        Ok(run_dir)
    }

    /// Request cancellation of one pending or in-flight parameter.
    /// Canceling an already-terminal parameter is a no-op.
    pub fn cancel(&self, name: &str) {
        let slots = lock(&self.shared.slots);
        let Some(slot) = slots.iter().find(|s| s.name == name) else {
            debug!("cancel requested for unqueued parameter {name}");
            return;
        };

        let went_terminal = {
            let mut st = lock(&slot.state);
            match *st {
                JobState::Queued => {
                    *st = JobState::Terminal(ResultType::Canceled);
                    true
                }
                JobState::Dispatching | JobState::Running => {
                    slot.cancel.cancel();
                    info!("parameter {name}: cancellation requested");
                    false
                }
                JobState::Terminal(_) => false,
            }
        };

        if went_terminal {
            info!("parameter {name}: canceled before start");
            lock(&self.shared.results).insert(name.to_string(), ResultRecord::canceled(None));
            let _ = self.shared.event_tx.send(ProgressEvent::Canceled {
                name: name.to_string(),
            });
        }
    }

    /// Request cancellation of every pending or in-flight parameter.
    pub fn cancel_all(&self) {
        let names: Vec<String> = lock(&self.shared.slots)
            .iter()
            .map(|s| s.name.clone())
            .collect();
        for name in names {
            self.cancel(&name);
        }
    }

    /// Wait until every queued parameter of the current run is terminal.
    /// Returns immediately when nothing is running.
    pub async fn join(&mut self) {
        if let Some(handle) = self.scheduler.as_mut() {
            if let Err(e) = handle.await {
                warn!("scheduler task failed: {e}");
            }
            self.scheduler = None;
        }
    }

    /// Snapshot of the result table. Only meaningful after `join()`.
    pub fn results(&self) -> BTreeMap<String, ResultType> {
        lock(&self.shared.results)
            .iter()
            .map(|(name, record)| (name.clone(), record.result_type))
            .collect()
    }

    /// Snapshot of the full result records.
    pub fn result_records(&self) -> BTreeMap<String, ResultRecord> {
        lock(&self.shared.results).clone()
    }
}

/// One job: invoke the runner, honor the cancellation grace deadline,
/// classify, and report the terminal state.
#[allow(clippy::too_many_arguments)]
async fn run_job(
    shared: Arc<Shared>,
    runner: Arc<dyn JobRunner>,
    def: ParameterDef,
    options: RuntimeOptions,
    run_dir: PathBuf,
    name: String,
    state: Arc<Mutex<JobState>>,
    cancel: CancelToken,
    resolved: Option<ConcreteSource>,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    let total_steps = runner.total_steps(&def);
    let _ = shared.event_tx.send(ProgressEvent::Started {
        name: name.clone(),
        total_steps,
    });
    info!("parameter {name}: started ({total_steps} steps)");

    let record = match rundir::param_dir(&run_dir, &name) {
        Err(e) => {
            warn!("parameter {name}: {e}");
            ResultRecord::fault(e.to_string(), resolved)
        }
        Ok(param_dir) => {
            let sink = ProgressSink::new(name.clone(), state.clone(), shared.event_tx.clone());
            let watcher = cancel.clone();
            let mut job = runner.run(&def, &options, &param_dir, cancel.clone(), &sink);

            let outcome = tokio::select! {
                res = &mut job => Some(res),
                _ = async {
                    watcher.cancelled().await;
                    tokio::time::sleep(options.cancel_grace).await;
                } => None,
            };

            match outcome {
                // Grace period expired; stop waiting and classify the
                // parameter canceled. Dropping the runner future aborts
                // cooperative async work at its next await point.
                None => {
                    warn!(
                        "parameter {name}: did not stop within {:?} of cancellation",
                        options.cancel_grace
                    );
                    ResultRecord::canceled(resolved)
                }
                // A late natural result after cancellation is still
                // recorded as canceled.
                Some(_) if cancel.is_canceled() => ResultRecord::canceled(resolved),
                Some(Ok(measurements)) => classify::classify(&def, &measurements.values, resolved),
                Some(Err(e)) => {
                    warn!("parameter {name}: runner fault: {e}");
                    ResultRecord::fault(e.to_string(), resolved)
                }
            }
        }
    };

    let result = record.result_type;
    if shared.finish(&name, &state, record) {
        info!("parameter {name}: {result}");
    }
    drop(permit);
}
