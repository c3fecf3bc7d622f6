//! Configuration file discovery and loading.

use crate::model::BootstrapConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Project-local configuration file, looked up in the working directory.
const LOCAL_CONFIG: &str = "bootstrap.json";

/// `<user config dir>/stack-bootstrap/config.json`
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stack-bootstrap").join("config.json"))
}

/// Load the configuration: `explicit` if given (must exist), otherwise the first existing
/// discovered file, otherwise built-in defaults.
pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<BootstrapConfig> {
    match explicit {
        Some(path) => read(path),
        None => match discover(cwd, user_config_path()) {
            Some(path) => read(&path),
            None => Ok(BootstrapConfig::default()),
        },
    }
}

fn discover(cwd: &Path, user_path: Option<PathBuf>) -> Option<PathBuf> {
    std::iter::once(cwd.join(LOCAL_CONFIG))
        .chain(user_path)
        .find(|p| p.is_file())
}

fn read(path: &Path) -> Result<BootstrapConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg = serde_json::from_str(&raw)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(cfg)
}
