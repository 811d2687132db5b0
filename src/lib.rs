//! Datasheet-driven circuit characterization.
//!
//! The core is the parameter orchestrator: it queues named parameters
//! from a datasheet, dispatches job runners under a concurrency budget,
//! streams lifecycle events, supports cooperative cancellation, and
//! aggregates terminal results into a pass/fail table. Simulator
//! backends plug in through the [`runner::JobRunner`] trait.

pub mod cli;
pub mod datasheet;
pub mod error;
pub mod model;
pub mod netlist;
pub mod orchestrator;
pub mod rundir;
pub mod runner;
pub mod summary;

pub use datasheet::Datasheet;
pub use error::Error;
pub use model::{
    ParameterDef, ProgressEvent, ResultRecord, ResultType, RuntimeOptions, Spec, SpecEntry,
    Testbench,
};
pub use netlist::{ConcreteSource, NetlistSource};
pub use orchestrator::{CancelToken, Orchestrator, ProgressSink};
pub use runner::{JobMeasurements, JobRunner, RecordedRunner, RunnerError};
