//! Bootstrap sequence controller.
//!
//! Runs environment preparation, dependency supervision and launch strictly in that order and
//! reports each stage transition. A stage only starts once the previous one has committed.

use super::launcher::launch;
use super::supervisor::{ensure_running, DependencyParams};
use crate::environment;
use crate::error::BootstrapError;
use crate::model::{BootstrapConfig, BootstrapEvent, EnvVars, LaunchSpec, Stage};
use crate::process::{ProcessQuery, ProcessSpawner};
use crate::report::Reporter;
use std::path::Path;
use tracing::debug;

/// OS-facing capabilities the sequence runs against.
pub(crate) struct Collaborators<'a> {
    pub query: &'a dyn ProcessQuery,
    pub spawner: &'a dyn ProcessSpawner,
    pub reporter: &'a dyn Reporter,
}

/// Run the full sequence and return the foreground application's exit code.
///
/// Fatal errors are reported as [`BootstrapEvent::StageFailed`] before being returned.
pub(crate) async fn run_bootstrap(
    cfg: &BootstrapConfig,
    cwd: &Path,
    base_env: EnvVars,
    deps: Collaborators<'_>,
) -> Result<i32, BootstrapError> {
    let Collaborators {
        query,
        spawner,
        reporter,
    } = deps;

    reporter.emit(BootstrapEvent::StageStarted {
        stage: Stage::Environment,
    });
    let ctx = environment::prepare(cwd, cfg, base_env, reporter);
    debug!(
        presence = ctx.presence,
        activation_path = ?ctx.activation_path,
        dotenv = ?ctx.dotenv_path,
        "environment prepared"
    );

    reporter.emit(BootstrapEvent::StageStarted {
        stage: Stage::Dependency,
    });
    let dependency = ensure_running(
        DependencyParams {
            name: &cfg.dependency.name,
            command: &cfg.dependency.command,
            settle: cfg.dependency.settle,
            match_prefix: cfg.dependency.match_prefix,
            log_file: cfg.dependency.log_file.as_deref(),
            env: &ctx.env,
        },
        query,
        spawner,
        reporter,
    )
    .await
    .map_err(|e| report_failure(reporter, e))?;
    debug!(
        name = %dependency.name,
        running_before_check = dependency.running_before_check,
        started = dependency.started,
        pid = ?dependency.pid,
        "dependency ready"
    );

    reporter.emit(BootstrapEvent::StageStarted {
        stage: Stage::Launch,
    });
    let spec = LaunchSpec {
        command: cfg.launch.clone(),
        env: ctx.env,
    };
    launch(spec, spawner, reporter)
        .await
        .map_err(|e| report_failure(reporter, e))
}

fn report_failure(reporter: &dyn Reporter, err: BootstrapError) -> BootstrapError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    reporter.emit(BootstrapEvent::StageFailed {
        stage: err.stage(),
        message,
    });
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommandLine;
    use crate::testing::{FakeProcessTable, FakeSpawner, RecordingReporter};
    use std::ffi::OsStr;
    use std::time::Duration;
    use tokio::time::Instant;

    fn base_env() -> EnvVars {
        let mut env = EnvVars::new();
        env.insert("PATH".into(), "/usr/bin:/bin".into());
        env.insert("LANG".into(), "C.UTF-8".into());
        env
    }

    fn config(env_dir: &str, settle: Duration, launch: &str) -> BootstrapConfig {
        let mut cfg = BootstrapConfig {
            env_dir: env_dir.into(),
            launch: CommandLine::parse(launch).unwrap(),
            ..BootstrapConfig::default()
        };
        cfg.dependency.settle = settle;
        cfg
    }

    fn stages(events: &[BootstrapEvent]) -> Vec<Stage> {
        events
            .iter()
            .filter_map(|e| match e {
                BootstrapEvent::StageStarted { stage } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn absent_env_running_dependency_launches_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let table = FakeProcessTable::with(&["ollama"]);
        let spawner = FakeSpawner::default();
        let reporter = RecordingReporter::default();
        let cfg = config("venv", Duration::from_secs(5), "echo hello");

        let start = Instant::now();
        let code = run_bootstrap(
            &cfg,
            dir.path(),
            base_env(),
            Collaborators {
                query: &table,
                spawner: &spawner,
                reporter: &reporter,
            },
        )
        .await
        .unwrap();

        assert_eq!(code, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(spawner.spawn_count(), 0);
        let launched = spawner.launched.lock().unwrap();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].command, CommandLine::parse("echo hello").unwrap());
        assert_eq!(launched[0].env, base_env());
        assert_eq!(
            stages(&reporter.events()),
            vec![Stage::Environment, Stage::Dependency, Stage::Launch]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stray_dotenv_does_not_leak_into_children_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "EXTRA=1\n").unwrap();
        let spawner = FakeSpawner::default();
        let cfg = config("venv", Duration::ZERO, "true");

        run_bootstrap(
            &cfg,
            dir.path(),
            base_env(),
            Collaborators {
                query: &FakeProcessTable::with(&[]),
                spawner: &spawner,
                reporter: &RecordingReporter::default(),
            },
        )
        .await
        .unwrap();

        assert_eq!(spawner.spawned.lock().unwrap()[0].1, base_env());
        assert_eq!(spawner.launched.lock().unwrap()[0].env, base_env());
    }

    #[tokio::test(start_paused = true)]
    async fn present_env_missing_dependency_waits_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("env")).unwrap();
        let table = FakeProcessTable::with(&[]);
        let spawner = FakeSpawner::default();
        let reporter = RecordingReporter::default();
        let cfg = config("env", Duration::from_secs(1), "true");

        let start = Instant::now();
        let code = run_bootstrap(
            &cfg,
            dir.path(),
            base_env(),
            Collaborators {
                query: &table,
                spawner: &spawner,
                reporter: &reporter,
            },
        )
        .await
        .unwrap();

        assert_eq!(code, 0);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(spawner.spawn_count(), 1);
        assert_eq!(spawner.launch_count(), 1);

        let launched = spawner.launched.lock().unwrap();
        let path = launched[0].env.get(OsStr::new("PATH")).unwrap();
        let first = std::env::split_paths(path).next().unwrap();
        assert!(first.starts_with(dir.path().join("env")));
        // The dependency sees the same prepared environment as the application.
        assert_eq!(spawner.spawned.lock().unwrap()[0].1, launched[0].env);

        let events = reporter.events();
        let settled = events
            .iter()
            .position(|e| matches!(e, BootstrapEvent::Settling { .. }))
            .unwrap();
        let launching = events
            .iter()
            .position(|e| matches!(e, BootstrapEvent::Launching { .. }))
            .unwrap();
        assert!(settled < launching);
    }

    #[tokio::test(start_paused = true)]
    async fn dependency_spawn_failure_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = FakeSpawner {
            fail_spawn: true,
            ..FakeSpawner::default()
        };
        let reporter = RecordingReporter::default();
        let cfg = config("venv", Duration::from_secs(1), "true");

        let err = run_bootstrap(
            &cfg,
            dir.path(),
            base_env(),
            Collaborators {
                query: &FakeProcessTable::with(&[]),
                spawner: &spawner,
                reporter: &reporter,
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage(), Stage::Dependency);
        assert_eq!(spawner.launch_count(), 0);
        let events = reporter.events();
        assert_eq!(stages(&events), vec![Stage::Environment, Stage::Dependency]);
        match events.last() {
            Some(BootstrapEvent::StageFailed { stage, message }) => {
                assert_eq!(*stage, Stage::Dependency);
                assert!(message.contains("No such file or directory"), "{message}");
            }
            other => panic!("expected a failure event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn launch_failure_is_reported_against_the_launch_stage() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = FakeSpawner {
            fail_launch: true,
            ..FakeSpawner::default()
        };
        let reporter = RecordingReporter::default();
        let cfg = config("venv", Duration::ZERO, "missing-app --flag");

        let err = run_bootstrap(
            &cfg,
            dir.path(),
            base_env(),
            Collaborators {
                query: &FakeProcessTable::with(&["ollama"]),
                spawner: &spawner,
                reporter: &reporter,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BootstrapError::Launch { ref command, .. } if command == "missing-app --flag"));
        assert!(matches!(
            reporter.events().last(),
            Some(BootstrapEvent::StageFailed {
                stage: Stage::Launch,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn application_exit_code_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = FakeSpawner {
            exit_code: 3,
            ..FakeSpawner::default()
        };
        let cfg = config("venv", Duration::ZERO, "false");

        let code = run_bootstrap(
            &cfg,
            dir.path(),
            base_env(),
            Collaborators {
                query: &FakeProcessTable::with(&["ollama"]),
                spawner: &spawner,
                reporter: &RecordingReporter::default(),
            },
        )
        .await
        .unwrap();

        assert_eq!(code, 3);
    }
}
