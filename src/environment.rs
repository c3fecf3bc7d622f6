//! Environment preparation.
//!
//! Activating an environment is a pure transformation of an [`EnvVars`] map; nothing here
//! touches the orchestrator's own process environment.

use crate::model::{BootstrapConfig, BootstrapEvent, EnvVars, EnvironmentContext};
use crate::report::Reporter;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use tracing::{debug, warn};

#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";

/// Probe `cwd` for the configured environment directory and build the environment every
/// later child process will inherit. A dotenv file is merged in only when one is configured.
pub fn prepare(
    cwd: &Path,
    cfg: &BootstrapConfig,
    base: EnvVars,
    reporter: &dyn Reporter,
) -> EnvironmentContext {
    let env_dir = cwd.join(&cfg.env_dir);
    let (presence, activation_path, mut env) = if env_dir.is_dir() {
        let env = apply_environment(&base, &env_dir);
        reporter.emit(BootstrapEvent::EnvironmentActivated {
            path: env_dir.clone(),
        });
        (true, Some(env_dir), env)
    } else {
        debug!(dir = %env_dir.display(), "no environment directory");
        reporter.emit(BootstrapEvent::EnvironmentAbsent {
            dir: cfg.env_dir.clone(),
        });
        (false, None, base)
    };

    let mut dotenv_path = None;
    if let Some(file) = &cfg.env_file {
        let path = cwd.join(file);
        if !path.is_file() {
            debug!(path = %path.display(), "no dotenv file");
        } else {
            match read_dotenv(&path) {
                Ok(vars) => {
                    let count = merge_missing(&mut env, vars);
                    reporter.emit(BootstrapEvent::DotenvLoaded {
                        path: path.clone(),
                        count,
                    });
                    dotenv_path = Some(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), "skipping dotenv file: {e}");
                    reporter.emit(BootstrapEvent::DotenvSkipped {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    EnvironmentContext {
        presence,
        activation_path,
        dotenv_path,
        env,
    }
}

/// Return `base` as it looks after activating the environment rooted at `env_dir`.
///
/// Prepends the environment's executable directory to the search path, sets the
/// `VIRTUAL_ENV` markers and drops `PYTHONHOME`.
pub fn apply_environment(base: &EnvVars, env_dir: &Path) -> EnvVars {
    let mut env = base.clone();
    let bin = env_dir.join(BIN_DIR);
    let key = path_key(&env);

    let mut entries = vec![bin.clone()];
    if let Some(existing) = env.get(&key).filter(|v| !v.is_empty()) {
        entries.extend(std::env::split_paths(existing));
    }
    match std::env::join_paths(entries) {
        Ok(joined) => {
            env.insert(key, joined);
        }
        Err(e) => warn!(bin = %bin.display(), "cannot put environment on the search path: {e}"),
    }

    env.insert("VIRTUAL_ENV".into(), env_dir.as_os_str().to_owned());
    if let Some(name) = env_dir.file_name() {
        env.insert("VIRTUAL_ENV_PROMPT".into(), name.to_owned());
    }
    env.remove(OsStr::new("PYTHONHOME"));
    env
}

// Windows treats variable names case-insensitively and usually spells it `Path`.
fn path_key(env: &EnvVars) -> OsString {
    if cfg!(windows) {
        env.keys()
            .find(|k| k.to_string_lossy().eq_ignore_ascii_case("PATH"))
            .cloned()
            .unwrap_or_else(|| OsString::from("Path"))
    } else {
        OsString::from("PATH")
    }
}

fn read_dotenv(path: &Path) -> Result<Vec<(String, String)>, dotenvy::Error> {
    dotenvy::from_path_iter(path)?.collect()
}

/// Insert variables that are not set yet; returns how many were added.
fn merge_missing(env: &mut EnvVars, vars: Vec<(String, String)>) -> usize {
    let mut added = 0;
    for (key, value) in vars {
        let key = OsString::from(key);
        if !env.contains_key(&key) {
            env.insert(key, value.into());
            added += 1;
        }
    }
    added
}
