use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use modrouter::ConnectionSummary;
use modrouter_bootstrap::{
    init_logging, init_minimal, wait_for_shutdown, BootstrapReport, CliArgs, ConfigSource,
    DotenvSource, EnvSource, WorkerConfig,
};

mod check_env;
mod jobs;
mod runtime;
mod scheduler;

use runtime::WorkerRuntime;
use scheduler::Scheduler;

/// ChurchApps API worker - timer jobs over per-module databases
#[derive(Parser)]
#[command(name = "api-worker")]
#[command(about = "ChurchApps API worker - timer jobs over per-module databases")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read module connection strings and settings from this .env file instead of the
    /// process environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Interval override for the short timer, e.g. "5m" (overrides config)
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    interval: Option<Duration>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the 15-minute notification timer once
    #[command(name = "timer-15min")]
    Timer15Min,
    /// Run the midnight timer once
    TimerMidnight,
    /// Run the scheduled-tasks hook once
    ScheduledTasks,
    /// Trigger the timers on their schedule until interrupted
    Schedule,
    /// Bootstrap and print the connection report as JSON
    Status,
    /// Check a .env file against the hardened deployment rules
    CheckEnv {
        /// The file to check
        #[arg(long, default_value = ".env")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::CheckEnv { file } = &cli.command {
        init_minimal();
        return run_check_env(file);
    }

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        interval: cli.interval,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = WorkerConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    init_logging(config.logging.as_ref(), Path::new("."));

    let source: Arc<dyn ConfigSource> = match &cli.env_file {
        Some(path) => Arc::new(
            DotenvSource::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
        ),
        None => Arc::new(EnvSource),
    };
    let runtime = WorkerRuntime::global(&config, source);

    let invocation = uuid::Uuid::new_v4();
    match cli.command {
        Commands::Timer15Min => {
            jobs::run_job("timer-15min", invocation, jobs::timer_15min(&runtime))
                .await
                .map(|_| ())
        }
        Commands::TimerMidnight => {
            jobs::run_job("timer-midnight", invocation, jobs::timer_midnight(&runtime))
                .await
                .map(|_| ())
        }
        Commands::ScheduledTasks => {
            jobs::run_job("scheduled-tasks", invocation, jobs::scheduled_tasks(&runtime)).await
        }
        Commands::Schedule => run_schedule(runtime, &config).await,
        Commands::Status => print_status(&runtime),
        Commands::CheckEnv { .. } => Ok(()),
    }
}

async fn run_schedule(runtime: Arc<WorkerRuntime>, config: &WorkerConfig) -> Result<()> {
    // Fail fast on a fatal configuration instead of at the first tick.
    runtime.init_env()?;

    let shutdown = async {
        if let Err(e) = wait_for_shutdown().await {
            tracing::error!(error = %e, "Signal handling failed; stopping scheduler");
        }
    };
    Scheduler::new(runtime, config.scheduler.clone())
        .run(shutdown)
        .await
}

#[derive(Serialize)]
struct Status<'a> {
    report: &'a BootstrapReport,
    connections: ConnectionSummary,
}

fn print_status(runtime: &WorkerRuntime) -> Result<()> {
    let report = runtime.init_env()?;
    let status = Status {
        report: &report,
        connections: runtime.bootstrap().store().summary(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&status).context("failed to render status")?
    );
    Ok(())
}

fn run_check_env(file: &Path) -> Result<()> {
    let verdict = check_env::check_env_file(file)?;
    for line in &verdict.lines {
        if verdict.passed {
            println!("{line}");
        } else {
            eprintln!("{line}");
        }
    }
    anyhow::ensure!(verdict.passed, "{} is not ready for deployment", file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["api-worker", "-vv", "timer-15min"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Timer15Min));

        let cli = Cli::try_parse_from(["api-worker", "timer-midnight"]).unwrap();
        assert!(matches!(cli.command, Commands::TimerMidnight));

        let cli = Cli::try_parse_from(["api-worker", "check-env", "--file", "prod.env"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckEnv { file } if file == Path::new("prod.env")));
    }

    #[test]
    fn test_interval_flag_uses_humantime() {
        let cli = Cli::try_parse_from(["api-worker", "--interval", "5m", "schedule"]).unwrap();
        assert_eq!(cli.interval, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_check_env_defaults_to_dotenv() {
        let cli = Cli::try_parse_from(["api-worker", "check-env"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckEnv { file } if file == Path::new(".env")));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["api-worker", "serve"]).is_err());
    }
}
