use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use virtclock_config::VirtclockConfig;
use virtclock_telemetry::{DiagnosticSink, EventLogger, MetricsRecorder};

use crate::error::CliError;
use crate::replay::{self, ReplayReport, Timeline};
use crate::scenario::Scenario;

/// Same bounds as `ReplayConfig`.
const MAX_STEPS: u64 = 1_000_000;
const MAX_STEP_MS: u64 = 86_400_000;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file to use instead of `config/virtclock.yaml`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a scenario file on a virtual clock
    Replay(ReplayArgs),
    /// Run the built-in 3ms ticker and 1ms `after` scenario
    Demo(DemoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    pub scenario: PathBuf,
    /// Number of steps to advance (overrides `replay.steps`)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_STEPS))]
    pub steps: Option<u64>,
    /// Virtual milliseconds per step (overrides `replay.step_ms`)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_STEP_MS))]
    pub step_ms: Option<u64>,
    /// Fail unless the trace hashes to this value
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Print Prometheus counters after the run
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    #[arg(
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..=MAX_STEPS)
    )]
    pub steps: u64,
    #[arg(long)]
    pub validate_hash: Option<String>,
}

pub fn run_command(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => VirtclockConfig::load_from_path(path)?,
        None => VirtclockConfig::load()?,
    };
    EventLogger::init(&config.telemetry.log_filter);

    match cli.command {
        Commands::Replay(args) => {
            let scenario = Scenario::load_from_file(&args.scenario)?;
            info!(scenario = %args.scenario.display(), "replaying scenario");
            let start = match scenario.start_unix_ms {
                Some(ms) => Utc
                    .timestamp_millis_opt(ms)
                    .single()
                    .ok_or(CliError::StartOutOfRange(ms))?,
                None => config.replay.start_time(),
            };
            let timeline = Timeline {
                start,
                step: Duration::from_millis(args.step_ms.unwrap_or(config.replay.step_ms)),
                steps: args.steps.unwrap_or(config.replay.steps),
            };
            execute(
                &scenario,
                timeline,
                args.metrics || config.telemetry.metrics,
                args.validate_hash.as_deref(),
            )
        }
        Commands::Demo(args) => {
            let scenario = Scenario::demo();
            let timeline = Timeline {
                start: DateTime::UNIX_EPOCH,
                step: Duration::from_millis(1),
                steps: args.steps,
            };
            execute(
                &scenario,
                timeline,
                config.telemetry.metrics,
                args.validate_hash.as_deref(),
            )
        }
    }
}

fn execute(
    scenario: &Scenario,
    timeline: Timeline,
    with_metrics: bool,
    validate_hash: Option<&str>,
) -> Result<(), CliError> {
    let metrics = if with_metrics {
        Some(Arc::new(MetricsRecorder::new()?))
    } else {
        None
    };
    let sink = metrics
        .as_ref()
        .map(|m| Arc::clone(m) as Arc<dyn DiagnosticSink>);

    let report = replay::run(scenario, timeline, sink)?;
    print_report(&report);

    if let Some(metrics) = &metrics {
        println!("{}", metrics.gather_metrics()?);
    }
    if let Some(expected) = validate_hash {
        report.check_hash(expected)?;
        info!("trace hash validated");
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    for entry in &report.trace {
        println!("{entry}");
    }
    println!("live subscriptions: {}", report.live_subscriptions);
    println!("trace hash: {}", report.hash);
}
