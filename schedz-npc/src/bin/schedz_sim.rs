//! Headless schedule simulation.
//!
//! Usage:
//!   schedz-sim [--config schedz.toml] [--agents N] [--citizens N]
//!              [--ticks N] [--dt SECS] [--danger-rate P] [CLASS=]FILE...
//!
//! Schedule files without a `CLASS=` prefix load for `npc_base`. Prints a JSON
//! report of every agent's channels, the engine counters and tick timing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use schedz_core::config::SchedzConfig;
use schedz_npc::vocabulary::BASE_CLASS;
use schedz_npc::{AgentKind, NpcRuntime, RandomSensor};
use tracing_subscriber::EnvFilter;

/// Headless schedule simulation
#[derive(Parser, Debug)]
#[command(name = "schedz-sim")]
#[command(about = "Tick a population of NPCs through their schedules and print a JSON report")]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generic NPCs to spawn
    #[arg(long, default_value_t = 8)]
    agents: usize,

    /// Citizens to spawn
    #[arg(long, default_value_t = 4)]
    citizens: usize,

    /// Ticks to run
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Seconds per tick
    #[arg(long, default_value_t = 0.1)]
    dt: f64,

    /// Chance per agent per tick of hearing danger
    #[arg(long, default_value_t = 0.002)]
    danger_rate: f64,

    /// Schedule files, optionally prefixed with the owning class (`npc_citizen=extra.sched`)
    #[arg(value_name = "[CLASS=]FILE", value_parser = parse_schedule_file)]
    files: Vec<ScheduleFile>,
}

#[derive(Debug, Clone)]
struct ScheduleFile {
    class: String,
    path: PathBuf,
}

fn parse_schedule_file(arg: &str) -> std::result::Result<ScheduleFile, String> {
    let (class, path) = arg.split_once('=').unwrap_or((BASE_CLASS, arg));
    if class.is_empty() || path.is_empty() {
        return Err(format!("expected [CLASS=]FILE, found {arg}"));
    }
    Ok(ScheduleFile {
        class: class.to_string(),
        path: PathBuf::from(path),
    })
}

fn init_tracing(config: &SchedzConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.general.log_level))
        .context("invalid log level")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SchedzConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SchedzConfig::default(),
    };
    init_tracing(&config)?;
    tracing::info!(
        agents = args.agents,
        citizens = args.citizens,
        ticks = args.ticks,
        "Starting schedz simulation"
    );

    let mut runtime = NpcRuntime::new(config).context("bringing up the runtime")?;
    for file in &args.files {
        let report = runtime
            .load_schedules_from_file(&file.class, &file.path)
            .with_context(|| format!("loading {} for {}", file.path.display(), file.class))?;
        if !report.is_clean() {
            tracing::warn!(
                file = %file.path.display(),
                diagnostics = report.diagnostics.len(),
                "Schedule file loaded with problems"
            );
        }
    }

    for i in 0..args.agents {
        runtime.spawn(format!("npc_{i}"), AgentKind::Generic);
    }
    for i in 0..args.citizens {
        runtime.spawn(format!("citizen_{i}"), AgentKind::Citizen);
    }

    let mut sensor = RandomSensor::new(args.danger_rate);
    runtime.run(0.0, args.dt, args.ticks, &mut sensor);

    let report = runtime.report();
    tracing::info!(
        "{}",
        report
            .tick_timing
            .summary(runtime.monitor().budget_ms())
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    runtime.teardown();
    Ok(())
}
