//! Job runner interface and the built-in re-evaluation runner.
//!
//! A runner executes one parameter's measurement recipe. Real simulator
//! backends live outside this crate; the orchestrator only depends on
//! the trait. Runners must observe the cancellation token at their own
//! checkpoints and report one step per testbench through the sink.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::model::{ParameterDef, RuntimeOptions};
use crate::orchestrator::{CancelToken, ProgressSink};

/// Fault raised by a job runner. Recovered by the orchestrator and
/// mapped to an `error` result for that parameter only.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// The runner observed a cancellation request and stopped early.
    #[error("interrupted by cancellation")]
    Canceled,

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("writing results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Measurements collected by a runner across a parameter's testbenches.
#[derive(Debug, Clone, Default)]
pub struct JobMeasurements {
    pub values: Vec<f64>,
}

/// Executes one parameter's simulation/analysis recipe.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Number of progress steps the run will report. Known before the
    /// first step is reported.
    fn total_steps(&self, def: &ParameterDef) -> usize {
        def.testbenches.len().max(1)
    }

    async fn run(
        &self,
        def: &ParameterDef,
        options: &RuntimeOptions,
        param_dir: &Path,
        cancel: CancelToken,
        progress: &ProgressSink,
    ) -> Result<JobMeasurements, RunnerError>;
}

/// Runner that re-evaluates measurements recorded in the datasheet
/// without invoking a simulator. This is what `nosim` mode uses, and the
/// default backend of the command line front end.
#[derive(Debug, Default)]
pub struct RecordedRunner;

#[async_trait]
impl JobRunner for RecordedRunner {
    async fn run(
        &self,
        def: &ParameterDef,
        options: &RuntimeOptions,
        param_dir: &Path,
        cancel: CancelToken,
        progress: &ProgressSink,
    ) -> Result<JobMeasurements, RunnerError> {
        let results_path = param_dir.join("results.json");
        if options.force && results_path.exists() {
            std::fs::remove_file(&results_path)?;
        }

        let mut values = Vec::new();
        let mut steps = Vec::new();
        for tb in &def.testbenches {
            if cancel.is_canceled() {
                return Err(RunnerError::Canceled);
            }
            if let Some(v) = tb.measured {
                values.push(v);
            }
            steps.push(serde_json::json!({
                "testbench": tb.name,
                "conditions": tb.conditions,
                "value": tb.measured,
            }));
            debug!("parameter {}: evaluated {}", def.name, tb.name);
            progress.step();
        }

        let payload = serde_json::json!({
            "parameter": def.name,
            "testbenches": steps,
        });
        tokio::fs::write(&results_path, serde_json::to_vec_pretty(&payload)?).await?;

        if !options.noplot {
            let svg = sparkline_svg(&values);
            tokio::fs::write(param_dir.join("plot.svg"), svg).await?;
        }

        Ok(JobMeasurements { values })
    }
}

/// Minimal polyline plot of the measured values.
fn sparkline_svg(values: &[f64]) -> String {
    const W: f64 = 320.0;
    const H: f64 = 80.0;
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (lo, hi) = finite.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    let span = if hi > lo { hi - lo } else { 1.0 };
    let points: Vec<String> = finite
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let x = if finite.len() > 1 {
                W * i as f64 / (finite.len() - 1) as f64
            } else {
                W / 2.0
            };
            let y = H - H * (v - lo) / span;
            format!("{x:.1},{y:.1}")
        })
        .collect();
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {W} {H}\">\
         <polyline fill=\"none\" stroke=\"#336\" stroke-width=\"1.5\" points=\"{}\"/></svg>\n",
        points.join(" ")
    )
}
