//! Make sure the background dependency is up before anything else runs.

use crate::error::BootstrapError;
use crate::model::{BootstrapEvent, CommandLine, DependencyProcessHandle, EnvVars};
use crate::process::{ProcessQuery, ProcessSpawner};
use crate::report::Reporter;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// What to look for and how to start it.
pub(crate) struct DependencyParams<'a> {
    pub name: &'a str,
    pub command: &'a CommandLine,
    pub settle: Duration,
    pub match_prefix: bool,
    pub log_file: Option<&'a Path>,
    pub env: &'a EnvVars,
}

/// Look the dependency up once; if it is not running, start it detached and wait `settle`.
///
/// The wait is a fixed delay. Nothing confirms the dependency is actually ready afterwards.
pub(crate) async fn ensure_running(
    params: DependencyParams<'_>,
    query: &dyn ProcessQuery,
    spawner: &dyn ProcessSpawner,
    reporter: &dyn Reporter,
) -> Result<DependencyProcessHandle, BootstrapError> {
    let DependencyParams {
        name,
        command,
        settle,
        match_prefix,
        log_file,
        env,
    } = params;

    let running = query
        .is_running(name, match_prefix)
        .map_err(|source| BootstrapError::ProcessQuery {
            name: name.to_owned(),
            source,
        })?;

    if running {
        reporter.emit(BootstrapEvent::DependencyRunning {
            name: name.to_owned(),
        });
        return Ok(DependencyProcessHandle {
            name: name.to_owned(),
            running_before_check: true,
            started: false,
            pid: None,
        });
    }

    let pid = spawner
        .spawn_detached(command, env, log_file)
        .map_err(|source| BootstrapError::DependencySpawn {
            name: name.to_owned(),
            command: command.to_string(),
            source,
        })?;
    reporter.emit(BootstrapEvent::DependencyStarted {
        name: name.to_owned(),
        pid,
    });

    if !settle.is_zero() {
        reporter.emit(BootstrapEvent::Settling { duration: settle });
        tokio::time::sleep(settle).await;
    }
    debug!(name, ?pid, ?settle, "dependency settled");

    Ok(DependencyProcessHandle {
        name: name.to_owned(),
        running_before_check: false,
        started: true,
        pid,
    })
}
