//! Stakepoll Node - command-line host for the governance engine.
//!
//! Loads a configuration, initializes logging and replays operation
//! scripts against an in-memory engine.

pub mod config;
pub mod script;
pub mod telemetry;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::NodeConfig;
use crate::script::{Report, Script, ScriptRunner, ACCEPTANCE_SCENARIO};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "stakepoll-node")]
#[command(about = "Stakepoll - stake-weighted polls over live deposits")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON operation script
    Run {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
    },
    /// Replay the built-in acceptance scenario
    Scenario,
    /// Write a default configuration file
    InitConfig {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let script = match &args.command {
        Command::InitConfig { path } => {
            NodeConfig::default().to_file(path)?;
            println!("Wrote default configuration to {}", path.display());
            return Ok(());
        }
        Command::Run { script } => Script::from_file(script)?,
        Command::Scenario => Script::from_json(ACCEPTANCE_SCENARIO)?,
    };

    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };

    // Override with CLI args
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    config.validate()?;

    match &config.logging.log_file {
        Some(file) => telemetry::init_telemetry_with_file(&config.logging.level, config.logging.is_json(), file)?,
        None => telemetry::init_telemetry(&config.logging.level, config.logging.is_json())?,
    }

    info!(
        name = %config.name,
        vote_limit_ceiling = config.governance.vote_limit_ceiling,
        strict = config.governance.strict_consistency,
        "Configuration loaded"
    );

    info!(script = %script.name, steps = script.steps.len(), "Replaying script");
    let report = ScriptRunner::run_script(&config, &script)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    summarize(&report)
}

fn summarize(report: &Report) -> anyhow::Result<()> {
    let failures = report.unexpected().count();
    if failures > 0 {
        for outcome in report.unexpected() {
            error!(index = outcome.index, op = outcome.op, error = ?outcome.error, "Unexpected step outcome");
        }
        anyhow::bail!("{} of {} steps did not behave as expected", failures, report.outcomes.len());
    }
    info!(steps = report.outcomes.len(), "Script completed");
    Ok(())
}
