//! HostFault CLI - Inject faults into the local host
//!
//! A command-line tool for compiling network filters, killing processes
//! for a bounded time and generating CPU, IO or memory load.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use hostfault_core::{AgentConfig, ConfigStore, StressKind};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "hostfault")]
#[command(author, version, about = "Inject faults into the local host")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log filter, e.g. `debug` or `hostfault_core=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and print a network blackhole filter
    Filter {
        /// Target IP or CIDR (repeatable, comma separated)
        #[arg(long, value_delimiter = ',')]
        ip: Vec<String>,

        /// Target hostname (repeatable, comma separated)
        #[arg(long, value_delimiter = ',')]
        hostname: Vec<String>,

        /// Port or port range such as 8000-8080 (repeatable, comma separated)
        #[arg(short, long, value_delimiter = ',')]
        port: Vec<String>,

        /// JSON file with restricted endpoints to exclude
        #[arg(long)]
        restricted: Option<PathBuf>,
    },

    /// Repeatedly kill processes matching a PID or name
    StopProcess {
        /// PID or process name substring
        process: String,

        /// How long to keep killing, in seconds
        #[arg(short, long, default_value_t = 30)]
        duration: u64,

        /// Pause between sweeps, in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,

        /// Force kill (SIGKILL) without graceful shutdown
        #[arg(short, long)]
        force: bool,
    },

    /// Generate load with stress-ng
    Stress {
        #[command(subcommand)]
        kind: StressCommand,
    },

    /// Check that stress-ng is installed
    Check,

    /// Show effective configuration
    Config,
}

#[derive(Args)]
struct StressRun {
    /// Load duration in seconds
    #[arg(short, long, default_value_t = 30)]
    duration: u64,

    /// Report an OOM-killed load generator as a failure
    #[arg(long)]
    fail_on_oom_kill: bool,
}

#[derive(Subcommand)]
enum StressCommand {
    /// Load CPUs
    Cpu {
        /// Load per worker in percent
        #[arg(long, default_value_t = 100)]
        load: u8,

        /// Worker count; 0 uses every allowed CPU
        #[arg(short, long, default_value_t = 0)]
        workers: u32,

        #[command(flatten)]
        run: StressRun,
    },
    /// Load disk IO
    Io {
        /// read_write_and_flush, read_write or flush
        #[arg(long, default_value = "read_write_and_flush")]
        mode: String,

        #[arg(short, long, default_value_t = 0)]
        workers: u32,

        /// Directory to write temporary files to
        #[arg(long, default_value = "/")]
        path: String,

        #[arg(long, default_value_t = 1024)]
        mbytes_per_worker: u64,

        #[command(flatten)]
        run: StressRun,
    },
    /// Allocate memory
    #[command(alias = "mem")]
    Memory {
        /// Share of total memory in percent
        #[arg(long)]
        percentage: u8,

        #[command(flatten)]
        run: StressRun,
    },
}

fn init_tracing(format: LogFormat, level: Option<&str>) -> anyhow::Result<()> {
    let env_filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
    }

    Ok(())
}

async fn load_config(path: Option<PathBuf>) -> anyhow::Result<(ConfigStore, AgentConfig)> {
    let store = match path {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::new()?,
    };
    let config = store.load().await?;
    Ok((store, config))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.log_level.as_deref())?;

    let (store, config) = load_config(cli.config).await?;

    match cli.command {
        Commands::Filter {
            ip,
            hostname,
            port,
            restricted,
        } => {
            commands::filter::run(config, ip, hostname, port, restricted, cli.json).await?;
        }
        Commands::StopProcess {
            process,
            duration,
            delay_ms,
            force,
        } => {
            commands::stop_process::run(config, process, duration, delay_ms, force, cli.json)
                .await?;
        }
        Commands::Stress { kind } => {
            let (kind, params, run) = match kind {
                StressCommand::Cpu { load, workers, run } => (
                    StressKind::Cpu,
                    commands::stress::cpu_params(load, workers),
                    run,
                ),
                StressCommand::Io {
                    mode,
                    workers,
                    path,
                    mbytes_per_worker,
                    run,
                } => (
                    StressKind::Io,
                    commands::stress::io_params(mode, workers, path, mbytes_per_worker),
                    run,
                ),
                StressCommand::Memory { percentage, run } => (
                    StressKind::Memory,
                    commands::stress::memory_params(percentage),
                    run,
                ),
            };
            commands::stress::run(
                config,
                kind,
                params,
                run.duration,
                run.fail_on_oom_kill,
                cli.json,
            )
            .await?;
        }
        Commands::Check => {
            commands::check::run(config, cli.json).await?;
        }
        Commands::Config => {
            commands::config::show(&store, &config, cli.json)?;
        }
    }

    Ok(())
}
