use crate::error::CommandLineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A complete child-process environment. Every spawned process gets exactly this map.
pub type EnvVars = BTreeMap<OsString, OsString>;

/// Snapshot of the orchestrator's own environment.
pub fn ambient_env() -> EnvVars {
    std::env::vars_os().collect()
}

/// A program plus its arguments, parsed by splitting on whitespace.
///
/// No shell is involved: quoting, globbing, and variable expansion are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(s: &str) -> Result<Self, CommandLineError> {
        Self::from_parts(s.split_whitespace().map(str::to_owned).collect())
    }

    pub fn from_parts(parts: Vec<String>) -> Result<Self, CommandLineError> {
        let mut parts = parts.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or(CommandLineError::Empty)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for CommandLine {
    type Error = CommandLineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommandLine> for String {
    fn from(value: CommandLine) -> Self {
        value.to_string()
    }
}

impl std::str::FromStr for CommandLine {
    type Err = CommandLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Environment directory probed relative to the working directory.
    pub env_dir: PathBuf,
    /// Dotenv file merged into the child environment. Not read unless set.
    pub env_file: Option<PathBuf>,
    pub dependency: DependencyConfig,
    /// Foreground application.
    pub launch: CommandLine,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            env_dir: PathBuf::from("venv"),
            env_file: None,
            dependency: DependencyConfig::default(),
            launch: CommandLine {
                program: "python".into(),
                args: vec!["agents/web_ui.py".into()],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// Executable name as it appears in the process table.
    pub name: String,
    pub command: CommandLine,
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    /// Accept processes whose name merely starts with `name`.
    pub match_prefix: bool,
    /// Append the dependency's stdout/stderr here instead of discarding them.
    pub log_file: Option<PathBuf>,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            name: "ollama".into(),
            command: CommandLine {
                program: "ollama".into(),
                args: vec!["serve".into()],
            },
            settle: Duration::from_secs(5),
            match_prefix: false,
            log_file: None,
        }
    }
}

/// The three orchestration steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Environment,
    Dependency,
    Launch,
}

impl Stage {
    /// Progress line printed when the stage begins.
    pub fn describe(self) -> &'static str {
        match self {
            Stage::Environment => "Preparing environment",
            Stage::Dependency => "Checking dependency",
            Stage::Launch => "Launching application",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Environment => "environment",
            Stage::Dependency => "dependency",
            Stage::Launch => "launch",
        })
    }
}

/// Result of probing the working directory for an environment to activate.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    pub presence: bool,
    pub activation_path: Option<PathBuf>,
    /// Dotenv file that contributed variables, if any.
    pub dotenv_path: Option<PathBuf>,
    pub env: EnvVars,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyProcessHandle {
    pub name: String,
    pub running_before_check: bool,
    pub started: bool,
    pub pid: Option<u32>,
}

/// Everything needed to start the foreground process. Consumed by the launch step.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub command: CommandLine,
    pub env: EnvVars,
}

/// Progress events emitted by the orchestrator and rendered by a [`crate::report::Reporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapEvent {
    StageStarted { stage: Stage },
    EnvironmentActivated { path: PathBuf },
    EnvironmentAbsent { dir: PathBuf },
    DotenvLoaded { path: PathBuf, count: usize },
    DotenvSkipped { path: PathBuf, reason: String },
    DependencyRunning { name: String },
    DependencyStarted { name: String, pid: Option<u32> },
    Settling { duration: Duration },
    Launching { command: CommandLine },
    StageFailed { stage: Stage, message: String },
}

impl BootstrapEvent {
    /// Render a human-readable line for the operator.
    pub fn to_message(&self) -> String {
        match self {
            BootstrapEvent::StageStarted { stage } => format!("== {} ==", stage.describe()),
            BootstrapEvent::EnvironmentActivated { path } => {
                format!("Activated environment at {}", path.display())
            }
            BootstrapEvent::EnvironmentAbsent { dir } => {
                format!(
                    "No {} directory found, using the current environment",
                    dir.display()
                )
            }
            BootstrapEvent::DotenvLoaded { path, count } => {
                format!("Loaded {count} variable(s) from {}", path.display())
            }
            BootstrapEvent::DotenvSkipped { path, reason } => {
                format!("Ignoring {}: {reason}", path.display())
            }
            BootstrapEvent::DependencyRunning { name } => format!("{name} is already running"),
            BootstrapEvent::DependencyStarted { name, pid } => match pid {
                Some(pid) => format!("Started {name} (pid {pid})"),
                None => format!("Started {name}"),
            },
            BootstrapEvent::Settling { duration } => format!(
                "Waiting {} for it to come up",
                humantime::format_duration(*duration)
            ),
            BootstrapEvent::Launching { command } => format!("Running {command}"),
            BootstrapEvent::StageFailed { stage, message } => {
                format!("stage '{stage}' failed: {message}")
            }
        }
    }
}
