// tests/config_validation.rs

use std::error::Error;
use std::time::Duration;

use wavebuild::config::{parse_str, ActionConfig, ConfigFile};
use wavebuild::errors::WavebuildError;
use wavebuild::types::{parse_duration, FingerprintStorage, TriggerWhileRunningBehaviour};
use wavebuild_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn validate(toml: &str) -> Result<ConfigFile, WavebuildError> {
    ConfigFile::try_from(parse_str(toml)?)
}

const PIPELINE: &str = r#"
[config]
default_task = "build"
jobs = 2
task_timeout = "5m"
triggered_while_running_behaviour = "cancel"
fingerprint_storage = "memory"

[[task]]
name = "clean"
action = { kind = "clean", paths = [".tmp", "dist"] }

[[task]]
name = "styles"
inputs = ["app/styles/**/*.scss"]
outputs = [".tmp/styles/main.css"]
cmd = "sass app/styles/main.scss .tmp/styles/main.css"

[[task]]
name = "fonts"
inputs = ["app/fonts/**/*.{eot,svg,ttf,woff,woff2}"]
action = { kind = "copy", dest = [".tmp/fonts", "dist/fonts"] }

[[task]]
name = "extras"
inputs = ["app/*.*", "!app/*.html"]
action = { kind = "copy", dest = ["dist"] }

[[task]]
name = "serve"
depends_on = ["styles", "fonts"]
cmd = "browser-sync start --server .tmp"
long_lived = true
ready_on_stdout = "Serving files"

[[task]]
name = "build"
depends_on = ["styles", "fonts", "extras"]
outputs = ["dist"]
report_size = true
"#;

#[test]
fn parses_full_pipeline() -> TestResult {
    let cfg = validate(PIPELINE)?;

    assert_eq!(cfg.config().default_task, "build");
    assert_eq!(cfg.config().jobs, 2);
    assert_eq!(cfg.config().debounce_ms, 100);
    assert_eq!(
        cfg.config().triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Cancel
    );
    assert_eq!(cfg.config().fingerprint_storage, FingerprintStorage::Memory);
    assert_eq!(cfg.tasks().len(), 6);

    let fonts = cfg.task("fonts").ok_or("fonts missing")?;
    assert_eq!(
        fonts.effective_action(),
        ActionConfig::Copy {
            dest: vec![".tmp/fonts".to_string(), "dist/fonts".to_string()],
            base: None,
        }
    );

    let styles = cfg.task("styles").ok_or("styles missing")?;
    assert!(matches!(styles.effective_action(), ActionConfig::Shell { .. }));
    assert!(styles.parallel);

    let build = cfg.task("build").ok_or("build missing")?;
    assert_eq!(build.effective_action(), ActionConfig::Group);
    assert!(build.report_size);

    Ok(())
}

#[test]
fn defaults_apply_without_config_section() -> TestResult {
    let cfg = validate(
        r#"
[[task]]
name = "default"
"#,
    )?;

    assert_eq!(cfg.config().default_task, "default");
    assert!(cfg.config().jobs >= 1);
    assert_eq!(
        cfg.config().triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Queue
    );
    assert_eq!(cfg.config().fingerprint_storage, FingerprintStorage::File);
    Ok(())
}

#[test]
fn duplicate_task_names_are_rejected() {
    let err = validate(
        r#"
[[task]]
name = "styles"
cmd = "true"

[[task]]
name = "styles"
cmd = "false"
"#,
    )
    .unwrap_err();

    assert!(matches!(err, WavebuildError::DuplicateTask(ref n) if n == "styles"));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn unknown_dependency_names_both_tasks() {
    let err = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("html").depends_on("ghost").build())
        .try_build()
        .unwrap_err();

    match &err {
        WavebuildError::UnknownTask { name, required_by } => {
            assert_eq!(name, "ghost");
            assert_eq!(required_by.as_deref(), Some("html"));
        }
        other => panic!("expected UnknownTask, got {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("ghost") && msg.contains("html"), "{msg}");
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn cycles_are_rejected_at_load_time() {
    let err = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").depends_on("b").build())
        .with_task(TaskConfigBuilder::new("b").depends_on("a").build())
        .with_task(TaskConfigBuilder::new("c").depends_on("a").build())
        .try_build()
        .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    match err {
        WavebuildError::CycleDetected(names) => assert_eq!(names, vec!["a", "b"]),
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let err = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("loop").depends_on("loop").build())
        .try_build()
        .unwrap_err();

    match err {
        WavebuildError::CycleDetected(names) => assert_eq!(names, vec!["loop"]),
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn cmd_and_action_are_mutually_exclusive() {
    let err = ConfigFileBuilder::new()
        .with_task(
            TaskConfigBuilder::new("clean")
                .cmd("rm -rf dist")
                .action(ActionConfig::Clean {
                    paths: vec!["dist".to_string()],
                })
                .build(),
        )
        .try_build()
        .unwrap_err();

    assert!(matches!(err, WavebuildError::ConfigError(_)));
}

#[test]
fn readiness_requires_long_lived() {
    let err = ConfigFileBuilder::new()
        .with_task(
            TaskConfigBuilder::new("serve")
                .cmd("serve")
                .ready_on_stdout("listening")
                .build(),
        )
        .try_build()
        .unwrap_err();

    assert!(matches!(err, WavebuildError::ConfigError(_)));
}

#[test]
fn long_lived_needs_a_shell_command() {
    let err = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("serve").long_lived(true).build())
        .try_build()
        .unwrap_err();

    assert!(matches!(err, WavebuildError::ConfigError(_)));
}

#[test]
fn invalid_regex_glob_and_durations_are_config_errors() {
    let bad_regex = ConfigFileBuilder::new()
        .with_task(
            TaskConfigBuilder::new("serve")
                .cmd("serve")
                .long_lived(true)
                .ready_on_stdout("(unclosed")
                .build(),
        )
        .try_build();
    assert!(matches!(bad_regex, Err(WavebuildError::ConfigError(_))));

    let bad_glob = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("styles").input("app/[").build())
        .try_build();
    assert!(matches!(bad_glob, Err(WavebuildError::ConfigError(_))));

    let bad_timeout = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("styles").timeout("ten seconds").build())
        .try_build();
    assert!(matches!(bad_timeout, Err(WavebuildError::ConfigError(_))));

    let bad_global = ConfigFileBuilder::new()
        .task_timeout("5 parsecs")
        .with_task(TaskConfigBuilder::new("styles").build())
        .try_build();
    assert!(matches!(bad_global, Err(WavebuildError::ConfigError(_))));
}

#[test]
fn durations_in_every_unit() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1H"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("").is_err());
}

#[test]
fn oversized_durations_are_rejected_not_wrapped() {
    let max = u64::MAX;
    assert!(parse_duration(&format!("{max}s")).is_ok());

    let err = parse_duration(&format!("{max}m")).unwrap_err();
    assert!(err.contains("too large"), "{err}");
    assert!(parse_duration(&format!("{}h", max / 60)).is_err());

    let huge_timeout = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("styles").timeout(&format!("{max}h")).build())
        .try_build();
    assert!(matches!(huge_timeout, Err(WavebuildError::ConfigError(_))));
}

#[test]
fn zero_jobs_and_empty_configs_are_rejected() {
    let zero_jobs = ConfigFileBuilder::new()
        .jobs(0)
        .with_task(TaskConfigBuilder::new("a").build())
        .try_build();
    assert!(matches!(zero_jobs, Err(WavebuildError::ConfigError(_))));

    let empty = ConfigFileBuilder::new().try_build();
    assert!(matches!(empty, Err(WavebuildError::ConfigError(_))));
}

#[test]
fn unknown_fields_are_toml_errors() {
    let err = validate(
        r#"
[[task]]
name = "styles"
after = ["clean"]
"#,
    )
    .unwrap_err();

    assert!(matches!(err, WavebuildError::TomlError(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn load_and_validate_reads_from_disk() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Wavebuild.toml");
    std::fs::write(&path, PIPELINE)?;

    let cfg = wavebuild::config::load_and_validate(&path)?;
    assert!(cfg.task("serve").is_some_and(|t| t.long_lived));

    let missing = wavebuild::config::load_and_validate(dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(WavebuildError::IoError(_))));
    Ok(())
}
