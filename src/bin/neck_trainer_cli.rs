use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neck_trainer::config::AppConfig;
use neck_trainer::program::TaskProgram;
use neck_trainer::simulation::{Simulation, SimulationOptions, SimulationReport};
use neck_trainer::telemetry::TelemetryHub;
use neck_trainer::ErrorCode;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "neck_trainer_cli",
    about = "Headless driver for neck exercise sessions"
)]
struct Cli {
    /// Session configuration file (defaults to assets/session_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Program file overriding the configured or built-in program
    #[arg(long)]
    program: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a session against a simulated participant and print events as JSON lines
    Simulate {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Probability that the participant holds the requested pose
        #[arg(long, default_value_t = 0.9)]
        accuracy: f32,
        /// Number of completed tasks after which the run stops
        #[arg(long, default_value_t = 4)]
        tasks: usize,
        /// Speed-up factor applied to every session period
        #[arg(long, default_value_t = 1.0)]
        time_scale: f32,
        /// Give up after this many seconds of wall time
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
        /// Only print the final report
        #[arg(long)]
        quiet: bool,
    },
    /// Print the active program as JSON
    DumpProgram,
    /// Check a program file and report the first problem found
    ValidateProgram { path: PathBuf },
    /// Run a simulated session behind the debug HTTP server
    #[cfg(feature = "debug_http")]
    Serve {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 0.9)]
        accuracy: f32,
        /// Bind address (defaults to NECK_TRAINER_DEBUG_HTTP_ADDR or 127.0.0.1:8787)
        #[arg(long)]
        addr: Option<std::net::SocketAddr>,
    },
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    if cli.program.is_some() {
        config.program_path = cli.program.clone();
    }

    match cli.command {
        Commands::Simulate {
            seed,
            accuracy,
            tasks,
            time_scale,
            timeout_secs,
            quiet,
        } => {
            let options = SimulationOptions {
                seed,
                accuracy,
                tasks_to_complete: tasks,
                time_scale,
            };
            run_simulate(&config, &options, Duration::from_secs(timeout_secs), quiet)
        }
        Commands::DumpProgram => run_dump(&config),
        Commands::ValidateProgram { path } => run_validate(&path),
        #[cfg(feature = "debug_http")]
        Commands::Serve {
            seed,
            accuracy,
            addr,
        } => run_serve(&config, seed, accuracy, addr),
    }
}

fn load_program(config: &AppConfig) -> Result<TaskProgram> {
    config.program().with_context(|| match &config.program_path {
        Some(path) => format!("loading program {}", path.display()),
        None => "building default program".to_string(),
    })
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("building tokio runtime")
}

fn run_simulate(
    config: &AppConfig,
    options: &SimulationOptions,
    limit: Duration,
    quiet: bool,
) -> Result<ExitCode> {
    let program = load_program(config)?;
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let telemetry = Arc::new(TelemetryHub::default());
        let simulation = Simulation::start(program, &config.session, options, Some(telemetry));

        let run = simulation.run_until_complete(options.tasks_to_complete, |event| {
            if quiet {
                return;
            }
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "failed to encode event"),
            }
        });

        let report = match tokio::time::timeout(limit, run).await {
            Ok(report) => report.context("running simulated session")?,
            Err(_) => {
                eprintln!(
                    "Simulation did not complete {} tasks within {:?}",
                    options.tasks_to_complete, limit
                );
                return Ok(ExitCode::from(2));
            }
        };

        emit_report(&report)?;
        Ok(ExitCode::from(0))
    })
}

fn run_dump(config: &AppConfig) -> Result<ExitCode> {
    let program = load_program(config)?;
    println!("{}", program.to_json_pretty()?);
    Ok(ExitCode::from(0))
}

fn run_validate(path: &Path) -> Result<ExitCode> {
    match TaskProgram::load_from_file(path) {
        Ok(program) => {
            println!("{}: ok ({} tasks)", path.display(), program.len());
            Ok(ExitCode::from(0))
        }
        Err(err) => {
            eprintln!("{}: invalid (code {}): {}", path.display(), err.code(), err.message());
            Ok(ExitCode::from(2))
        }
    }
}

#[cfg(feature = "debug_http")]
fn run_serve(
    config: &AppConfig,
    seed: u64,
    accuracy: f32,
    addr: Option<std::net::SocketAddr>,
) -> Result<ExitCode> {
    use neck_trainer::http::{self, DebugHttpState};

    let program = load_program(config)?;
    let runtime = build_runtime()?;
    let addr = addr.unwrap_or_else(http::addr_from_env);
    let token = http::token_from_env();
    let preview = token_preview(&token);

    runtime.block_on(async {
        let telemetry = Arc::new(TelemetryHub::default());
        let options = SimulationOptions {
            seed,
            accuracy,
            ..SimulationOptions::default()
        };
        let simulation =
            Simulation::start(program, &config.session, &options, Some(telemetry.clone()));
        let state = DebugHttpState::new(simulation.handle.clone(), telemetry, token);

        eprintln!("Debug HTTP server binding {addr} (token prefix {preview}***)");

        tokio::select! {
            result = http::run_http_server(state, addr) => result?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Shutting down");
            }
        }

        simulation.stop().await.context("stopping session")?;
        Ok(ExitCode::from(0))
    })
}

#[cfg(feature = "debug_http")]
fn token_preview(token: &str) -> String {
    token.chars().take(4).collect()
}

fn emit_report(report: &SimulationReport) -> Result<()> {
    let payload = ReportPayload { report };
    println!("{}", serde_json::to_string(&payload)?);
    Ok(())
}

#[derive(Serialize)]
struct ReportPayload<'a> {
    report: &'a SimulationReport,
}
