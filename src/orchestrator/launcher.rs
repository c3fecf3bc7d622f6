use crate::error::BootstrapError;
use crate::model::{BootstrapEvent, LaunchSpec};
use crate::process::ProcessSpawner;
use crate::report::Reporter;

/// Run the foreground application to completion and return its exit code.
pub(crate) async fn launch(
    spec: LaunchSpec,
    spawner: &dyn ProcessSpawner,
    reporter: &dyn Reporter,
) -> Result<i32, BootstrapError> {
    let command = spec.command.to_string();
    reporter.emit(BootstrapEvent::Launching {
        command: spec.command.clone(),
    });
    spawner
        .run_foreground(spec)
        .await
        .map_err(|source| BootstrapError::Launch { command, source })
}
