use crate::model::{ambient_env, BootstrapConfig, CommandLine};
use crate::orchestrator::{run_bootstrap, Collaborators};
use crate::process::{SystemProcessTable, TokioSpawner};
use crate::report::StderrReporter;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit code for any failure before the application itself ran.
pub const FATAL_EXIT_CODE: i32 = 1;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "stack-bootstrap",
    version,
    about = "Prepare the local environment, make sure the dependency is running, then launch the application"
)]
pub struct Cli {
    /// JSON configuration file (default: ./bootstrap.json, then the user config dir)
    #[arg(long, env = "STACK_BOOTSTRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment directory to activate when it exists
    #[arg(long, env = "STACK_BOOTSTRAP_ENV_DIR")]
    pub env_dir: Option<PathBuf>,

    /// Merge this dotenv file into the child environment (off unless given)
    #[arg(long, env = "STACK_BOOTSTRAP_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Process name of the background dependency
    #[arg(long, env = "STACK_BOOTSTRAP_DEPENDENCY")]
    pub dependency_name: Option<String>,

    /// Command that starts the dependency when it is not running
    #[arg(long, env = "STACK_BOOTSTRAP_DEPENDENCY_COMMAND")]
    pub dependency_command: Option<CommandLine>,

    /// How long to wait after starting the dependency
    #[arg(long, env = "STACK_BOOTSTRAP_SETTLE")]
    pub settle: Option<humantime::Duration>,

    /// Treat any process whose name starts with the dependency name as a match
    #[arg(long)]
    pub match_prefix: bool,

    /// Append the dependency's output to this file instead of discarding it
    #[arg(long)]
    pub dependency_log: Option<PathBuf>,

    /// Application command (trailing arguments after `--` take precedence)
    #[arg(long, env = "STACK_BOOTSTRAP_LAUNCH")]
    pub launch: Option<CommandLine>,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    pub print_plan: bool,

    /// Only print errors
    #[arg(long)]
    pub quiet: bool,

    /// Application command and arguments
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// Run the bootstrap sequence and return the process exit code.
pub async fn run(args: Cli) -> Result<i32> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let cfg = build_config(&args, &cwd)?;

    if args.print_plan {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(0);
    }

    let reporter = StderrReporter::new(args.quiet);
    let query = SystemProcessTable::default();
    let spawner = TokioSpawner;
    let outcome = run_bootstrap(
        &cfg,
        &cwd,
        ambient_env(),
        Collaborators {
            query: &query,
            spawner: &spawner,
            reporter: &reporter,
        },
    )
    .await;

    match outcome {
        Ok(code) => Ok(code),
        // The orchestrator already reported the failing stage.
        Err(_) => Ok(FATAL_EXIT_CODE),
    }
}

/// Build a `BootstrapConfig` from the configuration file and CLI arguments.
pub fn build_config(args: &Cli, cwd: &Path) -> Result<BootstrapConfig> {
    let cfg = crate::config::load(args.config.as_deref(), cwd)?;
    apply_args(cfg, args)
}

/// Layer command-line arguments (and their environment variables) over `cfg`.
fn apply_args(mut cfg: BootstrapConfig, args: &Cli) -> Result<BootstrapConfig> {
    if let Some(dir) = &args.env_dir {
        cfg.env_dir = dir.clone();
    }
    if let Some(file) = &args.env_file {
        cfg.env_file = Some(file.clone());
    }
    if let Some(name) = &args.dependency_name {
        cfg.dependency.name = name.clone();
    }
    if let Some(command) = &args.dependency_command {
        cfg.dependency.command = command.clone();
    }
    if let Some(settle) = args.settle {
        cfg.dependency.settle = Duration::from(settle);
    }
    if args.match_prefix {
        cfg.dependency.match_prefix = true;
    }
    if let Some(log) = &args.dependency_log {
        cfg.dependency.log_file = Some(log.clone());
    }

    if !args.command.is_empty() {
        cfg.launch = CommandLine::from_parts(args.command.clone())
            .context("invalid application command")?;
    } else if let Some(launch) = &args.launch {
        cfg.launch = launch.clone();
    }

    if cfg.dependency.name.trim().is_empty() {
        anyhow::bail!("dependency name must not be empty");
    }
    Ok(cfg)
}
