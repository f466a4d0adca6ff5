//! IQL routing simulator
//!
//! Replays a contact plan, or a randomly generated one, against the
//! congestion-aware epidemic router and prints delivery statistics.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use iql_logging::{ConsoleConfig, IqlSubscriberBuilder, LogConfig};
use iql_simulation::{PolicyKind, RandomScenario, Scenario, World};

#[derive(Parser)]
#[command(
    name = "iql-sim",
    about = "Congestion-aware epidemic DTN routing simulator",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write JSONL logs to this directory instead of the console
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file
    Run {
        /// Scenario JSON file
        scenario: PathBuf,

        /// Routing policy every node runs
        #[arg(short, long, value_enum, default_value_t = PolicyKind::Adaptive)]
        policy: PolicyKind,

        /// Write the report as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a scenario file once per policy
    Compare {
        /// Scenario JSON file
        scenario: PathBuf,

        /// Write both reports as a JSON array to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate and run a random scenario
    Random {
        /// Number of nodes
        #[arg(short, long, default_value = "20")]
        nodes: u32,

        /// Number of contacts before merging overlaps
        #[arg(short, long, default_value = "400")]
        contacts: usize,

        /// Number of messages
        #[arg(short, long, default_value = "100")]
        messages: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Simulated seconds
        #[arg(short, long, default_value = "3600")]
        duration: f64,

        /// Routing policy every node runs
        #[arg(short, long, value_enum, default_value_t = PolicyKind::Adaptive)]
        policy: PolicyKind,

        /// Save the generated scenario to this file
        #[arg(long)]
        save_scenario: Option<PathBuf>,

        /// Write the report as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match (&cli.log_dir, cli.verbose) {
        (Some(dir), _) => LogConfig::simulation(dir.clone()),
        (None, true) => LogConfig::development(),
        (None, false) => LogConfig {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            ..Default::default()
        },
    };
    let _log_guard = IqlSubscriberBuilder::new().with_config(config).init();

    match cli.command {
        Commands::Run {
            scenario,
            policy,
            output,
        } => {
            let scenario = load(&scenario)?;
            let report = World::new(scenario, policy)?.run();
            print!("{}", report);
            write_reports(output.as_deref(), &report)?;
        }
        Commands::Compare { scenario, output } => {
            let scenario = load(&scenario)?;
            let mut reports = Vec::new();
            for policy in [PolicyKind::Adaptive, PolicyKind::Flood] {
                let report = World::new(scenario.clone(), policy)?.run();
                print!("{}", report);
                println!();
                reports.push(report);
            }
            write_reports(output.as_deref(), &reports)?;
        }
        Commands::Random {
            nodes,
            contacts,
            messages,
            seed,
            duration,
            policy,
            save_scenario,
            output,
        } => {
            let scenario = RandomScenario {
                nodes,
                contacts,
                messages,
                seed,
                duration,
                ..Default::default()
            }
            .generate()?;

            if let Some(path) = save_scenario {
                std::fs::write(&path, scenario.to_json()?)
                    .with_context(|| format!("writing scenario to {}", path.display()))?;
                info!(path = %path.display(), "Scenario saved");
            }

            let report = World::new(scenario, policy)?.run();
            print!("{}", report);
            write_reports(output.as_deref(), &report)?;
        }
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Scenario> {
    Scenario::load(path).with_context(|| format!("loading scenario {}", path.display()))
}

fn write_reports<T: serde::Serialize>(path: Option<&Path>, reports: &T) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}
