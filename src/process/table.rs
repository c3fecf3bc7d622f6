//! Process-table lookup by executable name.

use super::ProcessQuery;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use sysinfo::{Pid, Process, ProcessStatus, ProcessesToUpdate, System};

/// Linux truncates `/proc/<pid>/comm` to this many bytes.
const COMM_LEN: usize = 15;

/// Reads the live OS process table. Never matches the orchestrator itself.
pub struct SystemProcessTable {
    own_pid: Option<Pid>,
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self {
            own_pid: sysinfo::get_current_pid().ok(),
        }
    }
}

/// Whether `candidate`, an executable name from the process table, is `name`.
pub(crate) fn name_matches(candidate: &str, name: &str, match_prefix: bool) -> bool {
    if name.is_empty() {
        return false;
    }
    if candidate == name || (match_prefix && candidate.starts_with(name)) {
        return true;
    }
    name.len() > COMM_LEN && candidate.len() == COMM_LEN && name.starts_with(candidate)
}

/// Exited processes that have not been reaped yet still carry their name.
fn is_live(process: &Process) -> bool {
    !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
        && process.thread_kind().is_none()
}

/// The reported process name plus the basenames of its executable and `argv[0]`.
fn candidate_names(process: &Process) -> Vec<String> {
    let argv0 = process.cmd().first().map(|a| Path::new(a.as_os_str()));
    [
        Some(process.name()),
        process.exe().and_then(Path::file_name),
        argv0.and_then(Path::file_name),
    ]
    .into_iter()
    .flatten()
    .map(executable_stem)
    .collect()
}

fn executable_stem(name: &OsStr) -> String {
    let name = name.to_string_lossy();
    if cfg!(windows) {
        if let Some(stem) = name.strip_suffix(".exe") {
            return stem.to_owned();
        }
    }
    name.into_owned()
}

impl ProcessQuery for SystemProcessTable {
    fn is_running(&self, name: &str, match_prefix: bool) -> io::Result<bool> {
        let mut system = System::new();
        if system.refresh_processes(ProcessesToUpdate::All, true) == 0 {
            return Err(io::Error::other("process table is empty or unreadable"));
        }

        let found = system.processes().iter().find(|(pid, process)| {
            Some(**pid) != self.own_pid
                && is_live(process)
                && candidate_names(process)
                    .iter()
                    .any(|candidate| name_matches(candidate, name, match_prefix))
        });
        if let Some((pid, _)) = found {
            tracing::debug!(pid = pid.as_u32(), name, "found running process");
        }
        Ok(found.is_some())
    }
}
