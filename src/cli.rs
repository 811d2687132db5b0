use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::datasheet::{self, Datasheet};
use crate::model::{ProgressEvent, ResultType, RuntimeOptions};
use crate::netlist::NetlistSource;
use crate::orchestrator::Orchestrator;
use crate::runner::RecordedRunner;
use crate::summary;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "charlab",
    version,
    about = "Run characterization jobs from a datasheet and report pass/fail results"
)]
pub struct Cli {
    /// Input characterization datasheet (YAML); searched for in the
    /// working directory when omitted
    pub datasheet: Option<PathBuf>,

    /// Output datasheet annotated with results
    pub output: Option<PathBuf>,

    /// Netlist source for characterization; 'best' prefers the full
    /// parasitic extraction when available
    #[arg(short, long, value_enum, default_value_t = NetlistSource::Best)]
    pub source: NetlistSource,

    /// Run only the named parameters; by default all parameters run
    #[arg(short, long = "parameter", num_args = 1..)]
    pub parameters: Vec<String>,

    /// Maximum number of parameters running in parallel
    #[arg(long, default_value_t = 4)]
    pub parallel_parameters: usize,

    /// Force new regeneration of all outputs
    #[arg(short, long)]
    pub force: bool,

    /// Do not generate any plots
    #[arg(long = "no-plot")]
    pub no_plot: bool,

    /// Do not re-run simulations; only re-evaluate existing results
    #[arg(long = "no-simulation")]
    pub no_simulation: bool,

    /// Run parameters sequentially
    #[arg(long)]
    pub sequential: bool,

    /// Keep at most this many old run directories
    #[arg(long)]
    pub max_runs: Option<usize>,

    /// Where run directories are created; defaults to the datasheet's
    /// run path
    #[arg(long)]
    pub run_path: Option<PathBuf>,

    /// How long a canceled job may keep running before it is written off
    #[arg(long, default_value = "5s")]
    pub cancel_grace: humantime::Duration,

    /// Log level filter (e.g. info, debug, charlab=trace)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Do not print per-step progress lines
    #[arg(long)]
    pub no_progress: bool,
}

/// Build runtime options from CLI arguments.
pub fn build_options(args: &Cli) -> RuntimeOptions {
    RuntimeOptions {
        force: args.force,
        noplot: args.no_plot,
        nosim: args.no_simulation,
        sequential: args.sequential,
        netlist_source: args.source,
        parallel_parameters: args.parallel_parameters,
        max_runs: args.max_runs,
        cancel_grace: Duration::from(args.cancel_grace),
    }
}

/// Run a characterization from the command line and return the result
/// table for exit-status purposes.
pub async fn run(args: Cli) -> Result<BTreeMap<String, ResultType>> {
    init_logging(&args.log_level)?;

    let sheet_path = match &args.datasheet {
        Some(p) => p.clone(),
        None => datasheet::find_datasheet(&std::env::current_dir()?)?,
    };
    let sheet = Datasheet::load(&sheet_path)?;
    let run_path = args
        .run_path
        .clone()
        .unwrap_or_else(|| sheet.run_path());
    let options = build_options(&args);

    if !options.nosim {
        info!("no simulator backend configured; evaluating recorded results");
    }
    let runner = Arc::new(RecordedRunner);
    let (mut orchestrator, events) = Orchestrator::new(sheet.clone(), options, run_path, runner);

    let names = if args.parameters.is_empty() {
        sheet.parameter_names()
    } else {
        args.parameters.clone()
    };
    for name in &names {
        orchestrator
            .queue(name)
            .with_context(|| format!("queueing parameter {name}"))?;
    }
    let total = orchestrator.queued();

    let run_dir = orchestrator.dispatch().context("starting the run")?;

    let (out_tx, out_handle) = spawn_output_writer();
    let drain = spawn_event_drain(
        events,
        Arc::new(sheet.clone()),
        out_tx.clone(),
        total,
        !args.no_progress,
    );

    // A user interrupt cancels every parameter and still waits for the
    // final states, so the result table below is complete.
    let interrupted = tokio::select! {
        _ = orchestrator.join() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        let _ = out_tx.send(OutputLine::Stderr("Interrupt received, canceling...".into()));
        orchestrator.cancel_all();
        orchestrator.join().await;
    }

    let results = orchestrator.results();
    let records = orchestrator.result_records();

    // Dropping the orchestrator closes the event stream; wait for the
    // drain so progress lines land before the summary.
    drop(orchestrator);
    let _ = drain.await;

    let report = summary::markdown_summary(&sheet, &records);
    if let Err(e) = std::fs::write(run_dir.join("summary.md"), &report) {
        warn!("failed to save summary: {e}");
    }
    for line in report.lines() {
        let _ = out_tx.send(OutputLine::Stdout(line.to_string()));
    }

    if let Some(out) = &args.output {
        sheet.save_annotated(&records, out)?;
    }

    drop(out_tx);
    let _ = out_handle.await;

    Ok(results)
}

/// Render lifecycle events as progress lines until the stream closes.
fn spawn_event_drain(
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    sheet: Arc<Datasheet>,
    out_tx: mpsc::UnboundedSender<OutputLine>,
    total: usize,
    show_steps: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut totals: HashMap<String, usize> = HashMap::new();
        let mut steps: HashMap<String, usize> = HashMap::new();
        let mut done = 0usize;

        while let Some(event) = events.recv().await {
            let label = sheet
                .get(event.name())
                .map(|p| p.label().to_string())
                .unwrap_or_else(|_| event.name().to_string());
            match event {
                ProgressEvent::Started { name, total_steps } => {
                    totals.insert(name, total_steps);
                    let _ = out_tx.send(OutputLine::Stderr(format!(
                        "Running {label} ({total_steps} steps)"
                    )));
                }
                ProgressEvent::Step { name } => {
                    let count = steps.entry(name.clone()).or_insert(0);
                    *count += 1;
                    if show_steps {
                        let all = totals.get(&name).copied().unwrap_or(0);
                        let _ = out_tx.send(OutputLine::Stderr(format!(
                            "{label}: step {count}/{all}"
                        )));
                    }
                }
                ProgressEvent::Canceled { .. } => {
                    done += 1;
                    let _ = out_tx.send(OutputLine::Stderr(format!(
                        "{label}: canceled [{done}/{total}]"
                    )));
                }
                ProgressEvent::Ended { result, .. } => {
                    done += 1;
                    let _ = out_tx.send(OutputLine::Stderr(format!(
                        "{label}: {result} [{done}/{total}]"
                    )));
                }
            }
        }
    })
}

fn init_logging(filter: &str) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .context("parsing log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
