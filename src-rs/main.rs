use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use gui_resilience_harness::backend::{self, BackendSet, Capability, HostEnvironment};
use gui_resilience_harness::config::{resolve_out_dir, ConfigFile, DEFAULT_CHAOS_SECS};
use gui_resilience_harness::process::ProcessController;
use gui_resilience_harness::{ApplicationTarget, Mode, Orchestrator, RunConfig, Timings};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "gui-resilience",
    version,
    about = "Launch a GUI app, drive it with scripted or chaos input, and check that it survives"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one resilience test against the application
    Run(RunArgs),
    /// Print which input/capture/focus backends are available here
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the application binary
    #[arg(long)]
    binary: PathBuf,
    /// Process-name substring identifying the app (default: binary file name)
    #[arg(long)]
    process_name: Option<String>,
    /// Window title to focus (default: process name)
    #[arg(long)]
    window_title: Option<String>,
    /// Test mode
    #[arg(long, value_enum, default_value_t = Mode::Simple)]
    mode: Mode,
    /// Chaos duration in seconds
    #[arg(long, default_value_t = DEFAULT_CHAOS_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    duration: u64,
    /// Seed for the chaos RNG, to replay a campaign
    #[arg(long)]
    seed: Option<u64>,
    /// Artifact directory (default: logs)
    #[arg(long, env = "GRH_OUT_DIR")]
    out_dir: Option<PathBuf>,
    /// TOML file with `out_dir` and a `[timings]` table of *_ms overrides
    #[arg(long, env = "GRH_CONFIG")]
    config: Option<PathBuf>,
    /// Kill the app after a successful run instead of leaving it open
    #[arg(long, action = ArgAction::SetTrue)]
    terminate_after: bool,
    /// Print the run result JSON to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Print JSON instead of a table
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => command_run(args),
        Commands::Probe(args) => command_probe(args),
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn command_run(args: RunArgs) -> Result<i32> {
    let file = args
        .config
        .as_deref()
        .map(ConfigFile::load)
        .transpose()
        .context("failed to load config")?;

    let mut timings = Timings::default();
    if let Some(file) = file.as_ref() {
        timings.apply(&file.timings);
    }

    let config = RunConfig {
        mode: args.mode,
        chaos_duration: Duration::from_secs(args.duration),
        seed: args.seed,
        out_dir: resolve_out_dir(args.out_dir, file.as_ref()),
        terminate_after: args.terminate_after,
        timings,
    };
    let target = ApplicationTarget::new(args.binary, args.process_name, args.window_title);
    info!(
        binary = %target.executable.display(),
        process = %target.process_name,
        mode = ?config.mode,
        "starting run"
    );

    let backends = BackendSet::probe(&HostEnvironment::detect(), timings.command_timeout);
    let processes = ProcessController::new(timings.supersede_settle, timings.launch_warmup);
    let mut orchestrator = Orchestrator::new(processes, backends);

    let result = orchestrator
        .run(&target, &config)
        .with_context(|| format!("run aborted for {}", target.executable.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string(&json!({
                "outcome": result.outcome,
                "artifact_paths": result.artifact_paths,
                "backends": orchestrator.backends().summary(),
            }))?
        );
    } else {
        for path in &result.artifact_paths {
            println!("{}", path.display());
        }
    }

    Ok(result.outcome.exit_code())
}

fn command_probe(args: ProbeArgs) -> Result<i32> {
    let env = HostEnvironment::detect();

    let mut capabilities = Map::new();
    for capability in Capability::ALL {
        let rows: Vec<Value> = backend::probe(capability, &env)
            .into_iter()
            .map(|provider| {
                json!({
                    "provider": provider.name(),
                    "family": provider.family(),
                    "executable": provider.executable(),
                })
            })
            .collect();
        capabilities.insert(capability.label().to_string(), Value::Array(rows));
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "os": env.os,
                "hyprland": env.is_hyprland(),
                "wayland": env.wayland_display,
                "x11": env.x11_display,
                "capabilities": capabilities,
            }))?
        );
    } else {
        for capability in Capability::ALL {
            let names: Vec<&str> = backend::probe(capability, &env)
                .into_iter()
                .map(|p| p.name())
                .collect();
            println!("{:<18} {}", capability.label(), names.join(" > "));
        }
    }
    Ok(0)
}
