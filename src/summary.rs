//! Markdown result summary.
//!
//! Turns the orchestrator's result table into the report printed after a
//! run and saved as `summary.md` in the run directory.

use std::collections::BTreeMap;

use crate::datasheet::Datasheet;
use crate::model::{LimitStatus, ResultRecord, ResultType};

/// Build the markdown summary for a finished run. Parameters appear in
/// datasheet order; parameters that were not part of the run are skipped.
pub fn markdown_summary(
    datasheet: &Datasheet,
    records: &BTreeMap<String, ResultRecord>,
) -> String {
    let mut lines = Vec::new();
    lines.push(format!("# {}", datasheet.name));
    lines.push(String::new());
    if let Some(desc) = &datasheet.description {
        lines.push(desc.clone());
        lines.push(String::new());
    }

    lines.push("| Parameter | Limit | Spec | Measured | Unit | Status |".to_string());
    lines.push("| --- | --- | --- | --- | --- | --- |".to_string());

    let mut counts: BTreeMap<ResultType, usize> = BTreeMap::new();
    for param in &datasheet.parameters {
        let Some(record) = records.get(&param.name) else {
            continue;
        };
        *counts.entry(record.result_type).or_insert(0) += 1;

        if record.limits.is_empty() {
            let note = record.error.as_deref().unwrap_or("");
            lines.push(format!(
                "| {} | | | {} | | {} |",
                param.label(),
                note,
                record.result_type,
            ));
            continue;
        }
        for outcome in &record.limits {
            let measured = outcome
                .value
                .map_or_else(String::new, |v| format_value(v));
            let status = match outcome.status {
                LimitStatus::Pass => "pass",
                LimitStatus::Fail => "fail",
                LimitStatus::Info => "info",
                LimitStatus::Unknown => "unknown",
            };
            lines.push(format!(
                "| {} | {} | {} | {} | {} | {} |",
                param.label(),
                outcome.kind,
                format_value(outcome.limit),
                measured,
                outcome.unit.as_deref().unwrap_or(""),
                status,
            ));
        }
    }

    lines.push(String::new());
    let totals: Vec<String> = counts
        .iter()
        .map(|(result, n)| format!("{n} {result}"))
        .collect();
    lines.push(format!("**Total:** {}", totals.join(", ")));
    lines.push(String::new());
    lines.join("\n")
}

/// Exit status for a finished run: the severity of the worst result.
pub fn exit_status(results: &BTreeMap<String, ResultType>) -> i32 {
    results
        .values()
        .map(|r| i32::from(r.severity()))
        .max()
        .unwrap_or(0)
}

fn format_value(v: f64) -> String {
    if v == 0.0 || (1e-3..1e6).contains(&v.abs()) {
        let s = format!("{v:.4}");
        let s = s.trim_end_matches('0').trim_end_matches('.');
        s.to_string()
    } else {
        format!("{v:.3e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LimitKind, LimitOutcome, ParameterDef, Spec, SpecEntry};

    fn sheet() -> Datasheet {
        Datasheet {
            name: "ota-5t".into(),
            description: Some("Five-transistor OTA".into()),
            paths: Default::default(),
            parameters: vec![ParameterDef {
                name: "gain".into(),
                display: Some("DC gain".into()),
                unit: Some("dB".into()),
                spec: Spec {
                    minimum: Some(SpecEntry::new(20.0)),
                    ..Default::default()
                },
                testbenches: Vec::new(),
                results: None,
            }],
            root: ".".into(),
        }
    }

    #[test]
    fn renders_limit_rows_and_totals() {
        let mut records = BTreeMap::new();
        records.insert(
            "gain".to_string(),
            ResultRecord {
                result_type: ResultType::Pass,
                netlist_source: None,
                limits: vec![LimitOutcome {
                    kind: LimitKind::Minimum,
                    limit: 20.0,
                    unit: Some("dB".into()),
                    value: Some(25.0),
                    status: LimitStatus::Pass,
                }],
                error: None,
            },
        );
        let md = markdown_summary(&sheet(), &records);
        assert!(md.contains("# ota-5t"));
        assert!(md.contains("| DC gain | minimum | 20 | 25 | dB | pass |"));
        assert!(md.contains("**Total:** 1 pass"));
    }

    #[test]
    fn error_results_render_without_limits() {
        let mut records = BTreeMap::new();
        records.insert("gain".to_string(), ResultRecord::fault("boom", None));
        let md = markdown_summary(&sheet(), &records);
        assert!(md.contains("| DC gain | | | boom | | error |"));
    }

    #[test]
    fn exit_status_ranks_severity() {
        let mut results = BTreeMap::new();
        results.insert("a".to_string(), ResultType::Pass);
        assert_eq!(exit_status(&results), 0);
        results.insert("b".to_string(), ResultType::Canceled);
        assert_eq!(exit_status(&results), 1);
        results.insert("c".to_string(), ResultType::Fail);
        assert_eq!(exit_status(&results), 3);
        results.insert("d".to_string(), ResultType::Error);
        assert_eq!(exit_status(&results), 4);
        assert_eq!(exit_status(&BTreeMap::new()), 0);
    }

    #[test]
    fn large_values_use_scientific_notation() {
        assert_eq!(format_value(1.2e6), "1.200e6");
        assert_eq!(format_value(25.0), "25");
    }
}
