//! Classification of measured values against spec limits.

use crate::model::{
    LimitKind, LimitOutcome, LimitStatus, ParameterDef, ResultRecord, ResultType, Spec, SpecEntry,
};
use crate::netlist::ConcreteSource;

/// Classify a completed parameter from its measurements.
///
/// Only limits declared in the spec are checked. A violated bound wins
/// over a missing measurement: `fail` beats `unknown` beats `pass`.
pub fn classify(
    def: &ParameterDef,
    values: &[f64],
    netlist_source: Option<ConcreteSource>,
) -> ResultRecord {
    let limits = check_limits(&def.spec, def.unit.as_deref(), values);

    let mut result_type = ResultType::Pass;
    for outcome in &limits {
        match outcome.status {
            LimitStatus::Fail => {
                result_type = ResultType::Fail;
                break;
            }
            LimitStatus::Unknown => result_type = ResultType::Unknown,
            LimitStatus::Pass | LimitStatus::Info => {}
        }
    }

    ResultRecord {
        result_type,
        netlist_source,
        limits,
        error: None,
    }
}

fn check_limits(spec: &Spec, param_unit: Option<&str>, values: &[f64]) -> Vec<LimitOutcome> {
    let comparable = comparable(values);
    let mut outcomes = Vec::new();
    if let Some(entry) = &spec.minimum {
        outcomes.push(check(LimitKind::Minimum, entry, param_unit, comparable.as_deref()));
    }
    if let Some(entry) = &spec.typical {
        outcomes.push(check(LimitKind::Typical, entry, param_unit, comparable.as_deref()));
    }
    if let Some(entry) = &spec.maximum {
        outcomes.push(check(LimitKind::Maximum, entry, param_unit, comparable.as_deref()));
    }
    outcomes
}

/// The measurement ensemble, or `None` when empty or not comparable.
fn comparable(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        None
    } else {
        Some(values.to_vec())
    }
}

fn check(
    kind: LimitKind,
    entry: &SpecEntry,
    param_unit: Option<&str>,
    values: Option<&[f64]>,
) -> LimitOutcome {
    let unit = entry
        .unit
        .clone()
        .or_else(|| param_unit.map(str::to_string));

    // A lower bound is checked against the worst (lowest) measurement,
    // an upper bound against the highest; typical reports the mean.
    let value = values.map(|vs| match kind {
        LimitKind::Minimum => vs.iter().copied().fold(f64::INFINITY, f64::min),
        LimitKind::Maximum => vs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        LimitKind::Typical => vs.iter().sum::<f64>() / vs.len() as f64,
    });

    let binding = entry.bound.unwrap_or(match kind {
        LimitKind::Minimum | LimitKind::Maximum => true,
        LimitKind::Typical => false,
    });

    let status = if !binding {
        LimitStatus::Info
    } else {
        match (kind, value) {
            (_, None) => LimitStatus::Unknown,
            (LimitKind::Minimum, Some(v)) => pass_fail(v >= entry.value),
            (LimitKind::Maximum, Some(v)) => pass_fail(v <= entry.value),
            // A binding typical needs a declared tolerance to be
            // checkable; without one it stays informational.
            (LimitKind::Typical, Some(v)) => match entry.tolerance {
                Some(tol) => pass_fail((v - entry.value).abs() <= tol),
                None => LimitStatus::Info,
            },
        }
    };

    LimitOutcome {
        kind,
        limit: entry.value,
        unit,
        value,
        status,
    }
}

fn pass_fail(ok: bool) -> LimitStatus {
    if ok {
        LimitStatus::Pass
    } else {
        LimitStatus::Fail
    }
}
