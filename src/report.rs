//! Operator-facing progress output.

use crate::model::BootstrapEvent;
use std::io::Write;

/// Sink for progress events. The orchestrator never prints directly.
pub trait Reporter: Send + Sync {
    fn emit(&self, event: BootstrapEvent);
}

/// Writes one line per event to stderr, keeping stdout for the launched application.
pub struct StderrReporter {
    quiet: bool,
}

impl StderrReporter {
    /// With `quiet` set, only stage failures are printed.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for StderrReporter {
    fn emit(&self, event: BootstrapEvent) {
        if self.quiet && !matches!(event, BootstrapEvent::StageFailed { .. }) {
            return;
        }
        let stderr = std::io::stderr();
        let mut err = stderr.lock();
        let _ = writeln!(err, "{}", event.to_message());
        let _ = err.flush();
    }
}
