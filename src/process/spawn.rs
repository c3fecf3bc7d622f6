//! Real process spawning using `tokio::process::Command`.

use super::ProcessSpawner;
use crate::model::{CommandLine, EnvVars, LaunchSpec};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

pub struct TokioSpawner;

fn command_with_env(command: &CommandLine, env: &EnvVars) -> Command {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args).env_clear().envs(env);
    cmd
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    // Own process group: terminal interrupts aimed at us do not reach it.
    cmd.process_group(0);
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    fn spawn_detached(
        &self,
        command: &CommandLine,
        env: &EnvVars,
        log_file: Option<&Path>,
    ) -> io::Result<Option<u32>> {
        let mut cmd = command_with_env(command, env);
        cmd.stdin(Stdio::null());
        match log_file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                cmd.stdout(file.try_clone()?).stderr(file);
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }
        detach(&mut cmd);

        let child = cmd.spawn()?;
        let pid = child.id();
        debug!(%command, ?pid, "spawned detached process");
        // kill_on_drop is off, so dropping the handle leaves the process running.
        drop(child);
        Ok(pid)
    }

    async fn run_foreground(&self, spec: LaunchSpec) -> io::Result<i32> {
        let mut cmd = command_with_env(&spec.command, &spec.env);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Ctrl-C goes to the whole foreground group; the child decides what to do with it and
        // we stay around to report how it ended. The listener exists before the child does.
        let mut interrupts = Interrupts::listen()
            .map_err(|e| warn!("cannot listen for interrupts: {e}"))
            .ok();
        let mut absorb_interrupts = interrupts.is_some();

        let mut child = cmd.spawn()?;
        debug!(command = %spec.command, pid = ?child.id(), "foreground process started");

        loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status?;
                    debug!(command = %spec.command, %status, "foreground process exited");
                    return Ok(exit_code(status));
                }
                received = next_interrupt(&mut interrupts), if absorb_interrupts => {
                    if received.is_none() {
                        warn!("interrupt listener closed");
                        absorb_interrupts = false;
                    }
                }
            }
        }
    }
}

/// Interrupt listener registered eagerly, unlike `tokio::signal::ctrl_c()` which only
/// registers once polled.
struct Interrupts {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
    #[cfg(windows)]
    inner: tokio::signal::windows::CtrlC,
}

impl Interrupts {
    #[cfg(unix)]
    fn listen() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            inner: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(windows)]
    fn listen() -> io::Result<Self> {
        Ok(Self {
            inner: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> Option<()> {
        self.inner.recv().await
    }
}

async fn next_interrupt(interrupts: &mut Option<Interrupts>) -> Option<()> {
    match interrupts {
        Some(interrupts) => interrupts.recv().await,
        None => std::future::pending().await,
    }
}
