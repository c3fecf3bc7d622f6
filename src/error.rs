use crate::model::Stage;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandLineError {
    #[error("command is empty")]
    Empty,
}

/// Fatal conditions that abort the bootstrap sequence.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("could not read the process table while looking for '{name}'")]
    ProcessQuery {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("could not start '{name}' with `{command}`")]
    DependencySpawn {
        name: String,
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("could not launch `{command}`")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl BootstrapError {
    /// The step that was running when the error occurred.
    pub fn stage(&self) -> Stage {
        match self {
            BootstrapError::ProcessQuery { .. } | BootstrapError::DependencySpawn { .. } => {
                Stage::Dependency
            }
            BootstrapError::Launch { .. } => Stage::Launch,
        }
    }
}
