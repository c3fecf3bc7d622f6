//! In-memory fakes for the process and reporting seams.

use crate::model::{BootstrapEvent, CommandLine, EnvVars, LaunchSpec};
use crate::process::{ProcessQuery, ProcessSpawner};
use crate::report::Reporter;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<BootstrapEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<BootstrapEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn emit(&self, event: BootstrapEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Process table with a fixed set of executable names.
pub(crate) struct FakeProcessTable {
    pub running: Vec<String>,
    pub fail: bool,
    pub queries: Mutex<Vec<String>>,
}

impl FakeProcessTable {
    pub fn with(running: &[&str]) -> Self {
        Self {
            running: running.iter().map(|s| s.to_string()).collect(),
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with(&[])
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl ProcessQuery for FakeProcessTable {
    fn is_running(&self, name: &str, match_prefix: bool) -> io::Result<bool> {
        self.queries.lock().unwrap().push(name.to_string());
        if self.fail {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "process table unavailable",
            ));
        }
        Ok(self.running.iter().any(|p| {
            if match_prefix {
                p.starts_with(name)
            } else {
                p == name
            }
        }))
    }
}

/// Records spawns and launches instead of creating processes.
#[derive(Default)]
pub(crate) struct FakeSpawner {
    pub fail_spawn: bool,
    pub fail_launch: bool,
    pub exit_code: i32,
    pub spawned: Mutex<Vec<(CommandLine, EnvVars)>>,
    pub launched: Mutex<Vec<LaunchSpec>>,
}

impl FakeSpawner {
    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessSpawner for FakeSpawner {
    fn spawn_detached(
        &self,
        command: &CommandLine,
        env: &EnvVars,
        _log_file: Option<&Path>,
    ) -> io::Result<Option<u32>> {
        if self.fail_spawn {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "No such file or directory",
            ));
        }
        let mut spawned = self.spawned.lock().unwrap();
        spawned.push((command.clone(), env.clone()));
        Ok(Some(40_000 + spawned.len() as u32))
    }

    async fn run_foreground(&self, spec: LaunchSpec) -> io::Result<i32> {
        if self.fail_launch {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "No such file or directory",
            ));
        }
        self.launched.lock().unwrap().push(spec);
        Ok(self.exit_code)
    }
}
