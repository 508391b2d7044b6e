// tests/process_actions.rs
#![cfg(unix)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wavebuild::exec::{ActionContext, LongLivedAction, ProcessRegistry, Readiness, ShellAction, TaskAction};
use wavebuild::fs::mock::MockFileSystem;
use wavebuild_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn context(task: &str, root: &Path) -> ActionContext {
    ActionContext {
        task: task.to_string(),
        root: root.to_path_buf(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        fs: Arc::new(MockFileSystem::new()),
    }
}

#[tokio::test]
async fn shell_command_runs_in_the_project_root() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let action = ShellAction::new("echo \"$WAVEBUILD_TASK\" > marker.txt", dir.path().to_path_buf());
    with_timeout(action.run(context("styles", dir.path()))).await?;

    let marker = std::fs::read_to_string(dir.path().join("marker.txt"))?;
    assert_eq!(marker.trim(), "styles");
    assert_eq!(action.describe(), "sh: echo \"$WAVEBUILD_TASK\" > marker.txt");
    Ok(())
}

#[tokio::test]
async fn shell_failure_reports_status_and_last_stderr_line() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let action = ShellAction::new(
        "echo first >&2; echo 'sass: undefined variable' >&2; exit 3",
        dir.path().to_path_buf(),
    );
    let err = with_timeout(action.run(context("styles", dir.path())))
        .await
        .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("exited with status 3"), "{message}");
    assert!(message.ends_with("sass: undefined variable"), "{message}");
    Ok(())
}

#[tokio::test]
async fn silent_failure_still_names_the_status() -> TestResult {
    let dir = tempfile::tempdir()?;
    let action = ShellAction::new("exit 7", dir.path().to_path_buf());

    let err = action.run(context("lint", dir.path())).await.unwrap_err();
    assert!(format!("{err:#}").ends_with("exited with status 7"));
    Ok(())
}

#[test]
fn readiness_rejects_bad_settings() {
    assert!(Readiness::from_config(None, None).is_ok_and(|r| r.is_immediate()));
    assert!(Readiness::from_config(Some("listening on \\d+"), Some("2s")).is_ok());

    let err = Readiness::from_config(Some("(unclosed"), None).unwrap_err();
    assert!(err.contains("ready_on_stdout"), "{err}");
    assert!(Readiness::from_config(None, Some("soon")).is_err());
}

#[tokio::test]
async fn long_lived_returns_once_stdout_is_ready() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let processes = Arc::new(ProcessRegistry::new());

    let action = LongLivedAction::new(
        "echo booting; echo 'listening on 3000'; sleep 30",
        dir.path().to_path_buf(),
        Readiness::from_config(Some("listening on \\d+"), None)?,
        processes.clone(),
    );

    with_timeout(action.run(context("serve", dir.path()))).await?;
    assert_eq!(processes.running(), vec!["serve"]);
    assert!(processes.is_running("serve"));

    // A second run finds the process alive and leaves it alone.
    with_timeout(action.run(context("serve", dir.path()))).await?;
    assert_eq!(processes.running(), vec!["serve"]);

    processes.shutdown().await;
    assert!(processes.running().is_empty());
    assert!(!processes.is_running("serve"));
    assert_eq!(action.describe(), "long-lived sh: echo booting; echo 'listening on 3000'; sleep 30");
    Ok(())
}

#[tokio::test]
async fn long_lived_ready_after_delay() -> TestResult {
    let dir = tempfile::tempdir()?;
    let processes = Arc::new(ProcessRegistry::new());

    let action = LongLivedAction::new(
        "sleep 30",
        dir.path().to_path_buf(),
        Readiness::from_config(None, Some("50ms"))?,
        processes.clone(),
    );

    with_timeout(action.run(context("tunnel", dir.path()))).await?;
    assert_eq!(processes.running(), vec!["tunnel"]);

    processes.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn long_lived_exit_before_ready_fails() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let processes = Arc::new(ProcessRegistry::new());

    let action = LongLivedAction::new(
        "echo 'port in use'; exit 1",
        PathBuf::from(dir.path()),
        Readiness::from_config(Some("listening"), None)?,
        processes.clone(),
    );

    let err = with_timeout(action.run(context("serve", dir.path())))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("before becoming ready"), "{err:#}");
    assert!(processes.running().is_empty());
    Ok(())
}
