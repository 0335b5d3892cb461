//! Flyover Simulation CLI
//!
//! Run deterministic booking-flow scenarios against the overlay engine.

use clap::Parser;
use flyover_core::overlay_runtime::OverlayConfig;
use flyover_sim::{ScenarioId, ScenarioRunner};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Error)]
enum SimError {
    /// A config or report file could not be read/written
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file did not parse
    #[error("{0}")]
    Config(#[from] flyover_core::overlay_runtime::ConfigError),

    /// The report could not be serialized
    #[error("Report error: {0}")]
    Report(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "flyover-sim",
    about = "Deterministic scenario runner for the Flyover overlay engine"
)]
struct Args {
    /// Scenario to run (all scenarios when omitted)
    #[arg(long, value_enum)]
    scenario: Option<ScenarioId>,

    /// Master seed; any failure reproduces from this number
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Simulated duration per scenario, seconds
    #[arg(long, default_value_t = 20.0)]
    duration: f64,

    /// Engine config JSON file (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON report of every run to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<OverlayConfig, SimError> {
    match path {
        Some(path) => Ok(OverlayConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(OverlayConfig::default()),
    }
}

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = Args::parse();

    let config = match load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    };

    let runner = ScenarioRunner {
        seed: args.seed,
        ..Default::default()
    };
    let scenarios: Vec<ScenarioId> = match args.scenario {
        Some(scenario) => vec![scenario],
        None => ScenarioId::all().to_vec(),
    };

    let mut failures = 0;
    let mut results = Vec::new();
    for scenario in scenarios {
        let result = runner.run(scenario, args.duration, config.clone());
        if result.passed {
            info!(
                "{}: PASS ({} ticks, {})",
                scenario.name(),
                result.total_ticks,
                result.metrics.summary()
            );
        } else {
            failures += 1;
            error!("{}: FAIL (seed {})", scenario.name(), result.seed);
            for violation in &result.violations {
                error!("  {violation}");
            }
        }
        results.push(result);
    }

    if let Some(path) = args.report.as_ref() {
        if let Err(err) = write_report(path, &results) {
            error!("{err}");
            std::process::exit(2);
        }
        info!("report written to {}", path.display());
    }

    if failures > 0 {
        std::process::exit(1);
    }
}

fn write_report(path: &PathBuf, results: &[flyover_sim::ScenarioResult]) -> Result<(), SimError> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json)?;
    Ok(())
}
