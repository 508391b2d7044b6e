// tests/report.rs

use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use wavebuild::cli::{CliArgs, Command};
use wavebuild::config::ActionConfig;
use wavebuild::dag::{Task, TaskRegistry};
use wavebuild::engine::Executor;
use wavebuild::exec::{GroupAction, ProcessRegistry};
use wavebuild::fs::mock::MockFileSystem;
use wavebuild::report::{format_bytes, format_duration, render_list, render_plan, render_session};
use wavebuild_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use wavebuild_test_utils::fake_executor::FakeExecutor;
use wavebuild_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn site_registry() -> Result<TaskRegistry, Box<dyn Error>> {
    let mut registry = TaskRegistry::new();
    registry.register(Task::new("styles", Arc::new(GroupAction)).inputs(["app/styles/**/*.scss"]))?;
    registry.register(Task::new("scripts", Arc::new(GroupAction)))?;
    registry.register(
        Task::new("bundle", Arc::new(GroupAction))
            .depends_on(["styles", "scripts"])
            .outputs(["dist"])
            .parallel(false)
            .report_size(true),
    )?;
    Ok(registry)
}

#[test]
fn byte_sizes_use_binary_units() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(2048), "2.0 KiB");
    assert_eq!(format_bytes(1536 * 1024), "1.5 MiB");
}

#[test]
fn durations_pick_a_readable_unit() {
    assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    assert_eq!(format_duration(Duration::from_secs(125)), "2m05s");
}

#[test]
fn plan_lists_waves_with_actions() -> TestResult {
    let registry = site_registry()?;
    let waves = vec![
        vec!["scripts".to_string(), "styles".to_string()],
        vec!["bundle".to_string()],
    ];

    assert_eq!(
        render_plan(&waves, &registry),
        "wave 0:\n  scripts  (group)\n  styles  (group)\nwave 1:\n  bundle  (group)\n"
    );
    Ok(())
}

#[test]
fn list_shows_only_declared_settings() -> TestResult {
    let text = render_list(&site_registry()?);

    assert!(text.contains("bundle\n    action: group\n    depends_on: scripts, styles\n    outputs: dist\n    parallel: false\n"));
    assert!(text.contains("styles\n    action: group\n    inputs: app/styles/**/*.scss\n"));
    assert!(text.contains("scripts\n    action: group\n"));
    Ok(())
}

#[tokio::test]
async fn session_report_has_totals_and_sizes() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("./dist/app.js", vec![b'x'; 2000]);
    fs.add_file("./dist/app.css", vec![b'y'; 48]);

    let registry = Arc::new(site_registry()?);
    let fake = FakeExecutor::new(Arc::new(Mutex::new(Vec::new()))).failing("scripts");
    let mut executor = Executor::new(Arc::clone(&registry), fake)?;

    let session = with_timeout(executor.run(&["bundle".to_string()])).await?;
    let text = render_session(&session, &registry, &fs, Path::new("."));

    assert!(text.contains("3 tasks: 1 ok, 0 skipped, 1 failed, 1 blocked in "), "{text}");
    assert!(text.contains("FAILED"), "{text}");
    assert!(text.contains("BLOCKED"), "{text}");
    // bundle was blocked, so no size line.
    assert!(!text.contains("size bundle"), "{text}");

    let fake = FakeExecutor::new(Arc::new(Mutex::new(Vec::new())));
    let mut executor = Executor::new(Arc::clone(&registry), fake)?;
    let session = with_timeout(executor.run(&["bundle".to_string()])).await?;
    let text = render_session(&session, &registry, &fs, Path::new("."));

    assert!(text.contains("3 tasks: 3 ok, 0 skipped, 0 failed, 0 blocked in "), "{text}");
    assert!(text.ends_with("size bundle: 2 files, 2.0 KiB\n"), "{text}");
    Ok(())
}

#[test]
fn registry_from_config_builds_each_action_kind() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .task_timeout("30s")
        .with_task(
            TaskConfigBuilder::new("clean")
                .action(ActionConfig::Clean {
                    paths: vec!["dist".to_string(), ".tmp".to_string()],
                })
                .build(),
        )
        .with_task(TaskConfigBuilder::new("styles").cmd("sass app/main.scss").timeout("2s").build())
        .with_task(
            TaskConfigBuilder::new("fonts")
                .action(ActionConfig::Copy {
                    dest: vec!["dist/fonts".to_string()],
                    base: None,
                })
                .input("app/fonts/**/*")
                .build(),
        )
        .with_task(
            TaskConfigBuilder::new("serve")
                .cmd("python -m http.server")
                .long_lived(true)
                .ready_after("1s")
                .build(),
        )
        .with_task(
            TaskConfigBuilder::new("build")
                .depends_on("styles")
                .depends_on("fonts")
                .build(),
        )
        .try_build()?;

    let processes = Arc::new(ProcessRegistry::new());
    let registry = TaskRegistry::from_config(&cfg, Path::new("."), &processes)?;

    let describe = |name: &str| registry.get(name).map(|t| t.action.describe());
    assert_eq!(describe("clean")?, "clean dist, .tmp");
    assert_eq!(describe("styles")?, "sh: sass app/main.scss");
    assert_eq!(describe("fonts")?, "copy -> dist/fonts");
    assert_eq!(describe("serve")?, "long-lived sh: python -m http.server");
    assert_eq!(describe("build")?, "group");

    assert_eq!(registry.get("styles")?.timeout, Some(Duration::from_secs(2)));
    assert_eq!(registry.get("build")?.timeout, Some(Duration::from_secs(30)));
    assert!(processes.running().is_empty());
    Ok(())
}

#[test]
fn cli_parses_run_flags() -> TestResult {
    let args = CliArgs::try_parse_from([
        "wavebuild", "--config", "site/Wavebuild.toml", "run", "html", "fonts", "-w", "-j", "4", "--force",
    ])?;

    assert_eq!(args.config, Path::new("site/Wavebuild.toml"));
    let Command::Run(run) = args.command else {
        return Err("expected run".into());
    };
    assert_eq!(run.tasks, vec!["html", "fonts"]);
    assert!(run.watch && run.force && !run.dry_run);
    assert_eq!(run.jobs, Some(4));

    let args = CliArgs::try_parse_from(["wavebuild", "list", "--log-level", "debug"])?;
    assert!(matches!(args.command, Command::List));

    assert!(CliArgs::try_parse_from(["wavebuild", "run", "--jobs", "many"]).is_err());
    Ok(())
}
