// tests/builtin_actions.rs

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wavebuild::exec::{ActionContext, CleanAction, CopyAction, GroupAction, TaskAction};
use wavebuild::fs::mock::MockFileSystem;
use wavebuild::fs::FileSystem;
use wavebuild::watch::{collect_matching_files, InputProfile};
use wavebuild_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn profile(name: &str, patterns: &[&str]) -> InputProfile {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    InputProfile::new(name, &patterns).unwrap()
}

fn context(fs: &MockFileSystem, task: &str, patterns: &[&str]) -> Result<ActionContext, Box<dyn Error>> {
    let inputs = collect_matching_files(fs, Path::new("."), &profile(task, patterns))?;
    Ok(ActionContext {
        task: task.to_string(),
        root: PathBuf::from("."),
        inputs,
        outputs: Vec::new(),
        fs: Arc::new(fs.clone()),
    })
}

fn fonts_fixture() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("./app/fonts/a.woff", "woff bytes");
    fs.add_file("./app/fonts/icons/b.ttf", "ttf bytes");
    fs.add_file("./app/fonts/LICENSE", "license");
    fs
}

#[tokio::test]
async fn copy_keeps_paths_relative_to_glob_base() -> TestResult {
    init_tracing();

    let fs = fonts_fixture();
    let ctx = context(&fs, "fonts", &["app/fonts/**/*.{woff,ttf}"])?;
    let copy = CopyAction::new(vec![".tmp/fonts".to_string(), "dist/fonts".to_string()], None);

    copy.run(ctx).await?;

    for dest in ["./.tmp/fonts", "./dist/fonts"] {
        assert_eq!(
            fs.contents(format!("{dest}/a.woff")),
            Some(b"woff bytes".to_vec())
        );
        assert_eq!(
            fs.contents(format!("{dest}/icons/b.ttf")),
            Some(b"ttf bytes".to_vec())
        );
        assert!(!fs.exists(Path::new(&format!("{dest}/LICENSE"))));
    }
    assert_eq!(copy.describe(), "copy -> .tmp/fonts, dist/fonts");
    Ok(())
}

#[tokio::test]
async fn copy_with_explicit_base() -> TestResult {
    let fs = fonts_fixture();
    let ctx = context(&fs, "fonts", &["app/fonts/**/*.ttf"])?;
    let copy = CopyAction::new(vec!["dist".to_string()], Some("app".to_string()));

    copy.run(ctx).await?;

    assert_eq!(
        fs.contents("./dist/fonts/icons/b.ttf"),
        Some(b"ttf bytes".to_vec())
    );
    Ok(())
}

#[tokio::test]
async fn copy_refuses_destinations_outside_the_root() -> TestResult {
    let fs = fonts_fixture();
    let ctx = context(&fs, "fonts", &["app/fonts/*.woff"])?;

    for dest in ["../elsewhere", "/tmp/abs"] {
        let copy = CopyAction::new(vec![dest.to_string()], None);
        let err = copy.run(ctx.clone()).await.unwrap_err();
        assert!(format!("{err:#}").contains(dest), "{err:#}");
    }
    Ok(())
}

#[tokio::test]
async fn clean_removes_trees_and_tolerates_missing_paths() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("./dist/index.html", "<html>");
    fs.add_file("./dist/fonts/a.woff", "woff");
    fs.add_file("./.tmp/styles/main.css", "body {}");
    fs.add_file("./app/index.html", "<html>");

    let ctx = context(&fs, "clean", &[])?;
    let clean = CleanAction::new(vec![
        "dist".to_string(),
        ".tmp/styles/main.css".to_string(),
        "never-created".to_string(),
    ]);
    clean.run(ctx).await?;

    assert!(!fs.exists(Path::new("./dist")));
    assert!(!fs.exists(Path::new("./dist/fonts/a.woff")));
    assert!(!fs.exists(Path::new("./.tmp/styles/main.css")));
    assert!(fs.is_dir(Path::new("./.tmp/styles")));
    assert!(fs.exists(Path::new("./app/index.html")));

    let root_entries = fs.read_dir(Path::new("."))?;
    assert!(!root_entries.contains(&PathBuf::from("./dist")));
    Ok(())
}

#[tokio::test]
async fn clean_refuses_parent_paths() -> TestResult {
    let fs = MockFileSystem::new();
    let ctx = context(&fs, "clean", &[])?;

    let err = CleanAction::new(vec!["../project".to_string()])
        .run(ctx)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("../project"));
    Ok(())
}

#[tokio::test]
async fn group_action_does_nothing() -> TestResult {
    let fs = fonts_fixture();
    let ctx = context(&fs, "build", &[])?;

    GroupAction.run(ctx).await?;
    assert_eq!(GroupAction.describe(), "group");
    assert!(fs.contents("./app/fonts/a.woff").is_some());
    Ok(())
}
