//! Application-level orchestration.
//!
//! This module owns the bootstrap sequence (environment, dependency, launch). The CLI layer
//! builds the configuration and the real process collaborators and calls into here.

mod controller;
mod launcher;
mod supervisor;

pub(crate) use controller::{run_bootstrap, Collaborators};
