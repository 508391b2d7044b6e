// tests/patterns_and_fingerprints.rs

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wavebuild::fingerprint::store::FINGERPRINT_FILE_PATH;
use wavebuild::fingerprint::{
    compute_aggregate_hash, compute_file_hash, FileCache, FileFingerprintStore, FingerprintStore,
    Fingerprinter, MemoryFingerprintStore,
};
use wavebuild::fs::mock::MockFileSystem;
use wavebuild::fs::FileSystem;
use wavebuild::watch::patterns::{collect_output_files, glob_base, missing_outputs};
use wavebuild::watch::{collect_matching_files, InputProfile};

type TestResult = Result<(), Box<dyn Error>>;

fn profile(patterns: &[&str]) -> InputProfile {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    InputProfile::new("task", &patterns).unwrap()
}

fn site() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("./app/index.html", "<html>");
    fs.add_file("./app/robots.txt", "User-agent: *");
    fs.add_file("./app/favicon.ico", "ico");
    fs.add_file("./app/styles/main.scss", "body {}");
    fs.add_file("./app/styles/partials/_vars.scss", "$x: 1;");
    fs.add_file("./.wavebuild/fingerprints", "styles abc");
    fs
}

#[test]
fn glob_base_is_the_literal_prefix() {
    assert_eq!(glob_base("app/fonts/**/*.woff"), "app/fonts");
    assert_eq!(glob_base("app/*.html"), "app");
    assert_eq!(glob_base("app/styles/main.scss"), "app/styles");
    assert_eq!(glob_base("app/*.{png,jpg}"), "app");
    assert_eq!(glob_base("*.txt"), "");
    assert_eq!(glob_base("**/*.rs"), "");
}

#[test]
fn star_does_not_cross_directories() {
    let p = profile(&["app/*.scss"]);
    assert!(!p.matches("app/styles/main.scss"));

    let p = profile(&["app/**/*.scss"]);
    assert!(p.matches("app/styles/main.scss"));
    assert!(p.matches("app/styles/partials/_vars.scss"));
}

#[test]
fn negated_patterns_exclude() {
    let extras = profile(&["app/*.*", "!app/*.html"]);

    assert!(extras.matches("app/robots.txt"));
    assert!(extras.matches("app/favicon.ico"));
    assert!(!extras.matches("app/index.html"));
    assert!(!extras.matches("app/styles/main.scss"));

    let only_excludes = profile(&["!app/*.html"]);
    assert!(only_excludes.is_empty());
    assert!(!only_excludes.matches("app/robots.txt"));
}

#[test]
fn collecting_inputs_applies_excludes_and_sorts() -> TestResult {
    let fs = site();
    let files = collect_matching_files(&fs, Path::new("."), &profile(&["app/*.*", "!app/*.html"]))?;

    let rel: Vec<String> = files
        .iter()
        .map(|f| f.relative.to_string_lossy().into_owned())
        .collect();
    assert_eq!(rel, vec!["favicon.ico", "robots.txt"]);
    Ok(())
}

#[test]
fn state_directory_is_never_an_input() -> TestResult {
    let fs = site();
    let files = collect_matching_files(&fs, Path::new("."), &profile(&["**/*"]))?;

    assert!(files.iter().all(|f| !f.path.starts_with("./.wavebuild")));
    assert_eq!(files.len(), 5);
    Ok(())
}

#[test]
fn outputs_resolve_files_dirs_and_globs() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("./dist/index.html", "<html>");
    fs.add_file("./dist/fonts/a.woff", "a");
    fs.add_file("./.tmp/styles/main.css", "body {}");

    let root = Path::new(".");
    let outputs = vec![
        "dist".to_string(),
        ".tmp/styles/*.css".to_string(),
        "dist/scripts/main.js".to_string(),
    ];

    let found = collect_output_files(&fs, root, &outputs)?;
    assert_eq!(found.len(), 3);
    assert_eq!(
        missing_outputs(&fs, root, &outputs),
        vec!["dist/scripts/main.js"]
    );
    Ok(())
}

#[test]
fn file_hash_depends_on_content() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("./a.txt", "same");
    fs.add_file("./b.txt", "same");
    fs.add_file("./c.txt", "different");

    let a = compute_file_hash(&fs, Path::new("./a.txt"))?;
    let b = compute_file_hash(&fs, Path::new("./b.txt"))?;
    let c = compute_file_hash(&fs, Path::new("./c.txt"))?;

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, blake3::hash(b"same").to_hex().to_string());
    assert!(compute_file_hash(&fs, Path::new("./missing.txt")).is_err());
    Ok(())
}

#[test]
fn aggregate_hash_covers_names_and_contents() {
    let base = compute_aggregate_hash([("a.scss", "h1"), ("b.scss", "h2")]);

    assert_eq!(base, compute_aggregate_hash([("a.scss", "h1"), ("b.scss", "h2")]));
    assert_ne!(base, compute_aggregate_hash([("a.scss", "h1"), ("c.scss", "h2")]));
    assert_ne!(base, compute_aggregate_hash([("a.scss", "h1"), ("b.scss", "h3")]));
    assert_ne!(base, compute_aggregate_hash([("a.scss", "h1")]));
    assert_ne!(
        compute_aggregate_hash([("ab", "c")]),
        compute_aggregate_hash([("a", "bc")])
    );
}

#[test]
fn file_cache_rehashes_only_after_a_change() -> TestResult {
    let fs = MockFileSystem::new();
    let path = Path::new("./app/main.js");
    fs.add_file(path, "v1");

    let mut cache = FileCache::new();
    let first = cache.get_or_compute(&fs, path)?;
    assert_eq!(cache.get_or_compute(&fs, path)?, first);
    assert_eq!(cache.len(), 1);

    fs.add_file(path, "v2");
    let second = cache.get_or_compute(&fs, path)?;
    assert_ne!(first, second);

    cache.invalidate(path);
    assert!(cache.is_empty());
    Ok(())
}

#[test]
fn fingerprint_changes_with_inputs() -> TestResult {
    let fs = site();
    let fingerprints = Fingerprinter::new(
        Arc::new(fs.clone()),
        PathBuf::from("."),
        Box::new(MemoryFingerprintStore::new()),
    );
    let styles = profile(&["app/styles/**/*.scss"]);

    let before = fingerprints.compute(&styles)?;
    assert_eq!(before.inputs.len(), 2);
    assert_eq!(fingerprints.compute(&styles)?.digest, before.digest);

    fs.add_file("./app/styles/partials/_vars.scss", "$x: 2;");
    let after = fingerprints.compute(&styles)?;
    assert_ne!(after.digest, before.digest);

    fs.remove(Path::new("./app/styles/partials"))?;
    let removed = fingerprints.compute(&styles)?;
    assert_eq!(removed.inputs.len(), 1);
    assert_ne!(removed.digest, after.digest);

    let empty = fingerprints.compute(&profile(&["nothing/**/*.scss"]))?;
    assert!(empty.inputs.is_empty());
    Ok(())
}

#[test]
fn memory_store_round_trip_and_prune() -> TestResult {
    let mut store = MemoryFingerprintStore::new();
    store.save("styles", "d1")?;
    store.save("scripts", "d2")?;
    assert_eq!(store.load("styles")?.as_deref(), Some("d1"));

    store.forget("styles")?;
    assert_eq!(store.load("styles")?, None);

    store.prune(&["html"])?;
    assert_eq!(store.load("scripts")?, None);
    Ok(())
}

#[test]
fn file_store_persists_one_line_per_task() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path().to_path_buf();

    let mut store = FileFingerprintStore::new(root.clone());
    assert_eq!(store.load("styles")?, None);
    store.save("styles", "d1")?;
    store.save("fonts", "d2")?;

    let reopened = FileFingerprintStore::new(root.clone());
    assert_eq!(reopened.load("styles")?.as_deref(), Some("d1"));

    let text = std::fs::read_to_string(root.join(FINGERPRINT_FILE_PATH))?;
    assert_eq!(text, "fonts d2\nstyles d1\n");

    store.prune(&["fonts"])?;
    assert_eq!(reopened.load("styles")?, None);
    assert_eq!(reopened.load("fonts")?.as_deref(), Some("d2"));
    Ok(())
}
