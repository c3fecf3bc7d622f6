//! Process-table lookup and process spawning.
//!
//! Both are traits so the orchestrator can be driven without touching the real OS.

mod spawn;
mod table;

pub use spawn::TokioSpawner;
pub use table::SystemProcessTable;

use crate::model::{CommandLine, EnvVars, LaunchSpec};
use async_trait::async_trait;
use std::io;
use std::path::Path;

/// Answers "is a process with this executable name running?".
pub trait ProcessQuery: Send + Sync {
    fn is_running(&self, name: &str, match_prefix: bool) -> io::Result<bool>;
}

#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Start `command` so that it outlives the orchestrator and never blocks on its streams.
    /// Returns the pid when the platform reports one.
    fn spawn_detached(
        &self,
        command: &CommandLine,
        env: &EnvVars,
        log_file: Option<&Path>,
    ) -> io::Result<Option<u32>>;

    /// Run the foreground process with inherited stdio and return its exit code.
    async fn run_foreground(&self, spec: LaunchSpec) -> io::Result<i32>;
}
