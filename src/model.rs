use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::netlist::{ConcreteSource, NetlistSource};

/// Filesystem locations named by a datasheet, relative to the datasheet file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paths {
    /// Schematic-captured netlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schematic: Option<PathBuf>,
    /// Layout-extracted netlist, no parasitics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<PathBuf>,
    /// Parasitic-extracted netlist, capacitance only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pex: Option<PathBuf>,
    /// Full R-C parasitic-extracted netlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcx: Option<PathBuf>,
    /// Where run directories are created. Defaults to `runs` next to the
    /// datasheet when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<PathBuf>,
}

/// One spec limit entry: a target value, its unit, and whether it binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecEntry {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Overrides the default boundness of the limit kind. Minimum and
    /// maximum bind by default; typical is informational by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound: Option<bool>,
    /// Allowed deviation for a binding typical limit. A typical limit
    /// declared as a bound without a tolerance stays informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl SpecEntry {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            unit: None,
            bound: None,
            tolerance: None,
        }
    }
}

/// Spec limits for one parameter, read-only to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<SpecEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typical: Option<SpecEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<SpecEntry>,
}

/// One concrete simulation configuration contributing measurements to a
/// parameter. Each testbench accounts for one progress step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testbench {
    pub name: String,
    /// Condition combination, display metadata only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, String>,
    /// Measurement recorded by a previous simulation, consumed when
    /// re-evaluating without a simulator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<f64>,
}

impl Testbench {
    pub fn measured(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            conditions: BTreeMap::new(),
            measured: Some(value),
        }
    }
}

/// A named unit of characterization work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    /// Human label used by presentation layers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub spec: Spec,
    #[serde(default)]
    pub testbenches: Vec<Testbench>,
    /// Terminal result of the most recent run, written back on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultRecord>,
}

impl ParameterDef {
    /// Label shown to users: the display string when present, else the name.
    pub fn label(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.name)
    }
}

/// Terminal classification of one parameter. Every parameter that reaches
/// a terminal state has exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Pass,
    Fail,
    Error,
    Unknown,
    Canceled,
}

impl ResultType {
    /// Severity for exit-code purposes: error outranks fail outranks
    /// unknown outranks canceled.
    pub fn severity(self) -> u8 {
        match self {
            ResultType::Pass => 0,
            ResultType::Canceled => 1,
            ResultType::Unknown => 2,
            ResultType::Fail => 3,
            ResultType::Error => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::Pass => "pass",
            ResultType::Fail => "fail",
            ResultType::Error => "error",
            ResultType::Unknown => "unknown",
            ResultType::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which limit kind a check was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Minimum,
    Typical,
    Maximum,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LimitKind::Minimum => "minimum",
            LimitKind::Typical => "typical",
            LimitKind::Maximum => "maximum",
        };
        f.write_str(s)
    }
}

/// Outcome of checking measured values against one declared limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitStatus {
    Pass,
    Fail,
    /// Informational limit, not checked against a bound.
    Info,
    /// Measurement missing or not comparable.
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOutcome {
    pub kind: LimitKind,
    pub limit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// The measured value compared against the limit, if one existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub status: LimitStatus,
}

/// Terminal result record for one parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "type")]
    pub result_type: ResultType,
    /// Concrete netlist source the run resolved to, recorded for
    /// traceability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netlist_source: Option<ConcreteSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limits: Vec<LimitOutcome>,
    /// Fault message when the job runner signaled failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRecord {
    pub fn canceled(netlist_source: Option<ConcreteSource>) -> Self {
        Self {
            result_type: ResultType::Canceled,
            netlist_source,
            limits: Vec::new(),
            error: None,
        }
    }

    pub fn fault(message: impl Into<String>, netlist_source: Option<ConcreteSource>) -> Self {
        Self {
            result_type: ResultType::Error,
            netlist_source,
            limits: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Immutable configuration snapshot for one run.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Re-derive all generated outputs even if cached.
    pub force: bool,
    /// Suppress plot generation.
    pub noplot: bool,
    /// Skip simulation and only re-evaluate existing results.
    pub nosim: bool,
    /// Run one parameter at a time.
    pub sequential: bool,
    pub netlist_source: NetlistSource,
    /// Concurrency budget for parameter jobs.
    pub parallel_parameters: usize,
    /// Retention count for old run directories; unset keeps everything.
    pub max_runs: Option<usize>,
    /// How long to keep waiting for a job after requesting cancellation
    /// before it is force-classified as canceled.
    pub cancel_grace: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            force: false,
            noplot: false,
            nosim: false,
            sequential: false,
            netlist_source: NetlistSource::Best,
            parallel_parameters: 4,
            max_runs: None,
            cancel_grace: Duration::from_secs(5),
        }
    }
}

/// Lifecycle events emitted by the orchestrator and drained by
/// presentation layers. For a single parameter the order is strictly
/// `Started`, then `Step` repeats, then exactly one of `Canceled` or
/// `Ended`. No ordering is guaranteed across parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProgressEvent {
    Started { name: String, total_steps: usize },
    Step { name: String },
    Canceled { name: String },
    Ended { name: String, result: ResultType },
}

impl ProgressEvent {
    pub fn name(&self) -> &str {
        match self {
            ProgressEvent::Started { name, .. }
            | ProgressEvent::Step { name }
            | ProgressEvent::Canceled { name }
            | ProgressEvent::Ended { name, .. } => name,
        }
    }
}
