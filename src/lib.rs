// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fingerprint;
pub mod fs;
pub mod logging;
pub mod report;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{CliArgs, Command, RunArgs};
use crate::config::{load_and_validate, ConfigFile};
use crate::dag::TaskRegistry;
use crate::engine::{Executor, SessionResult, TaskName};
use crate::errors::Result;
use crate::exec::{ActionExecutorBackend, ProcessRegistry};
use crate::fingerprint::Fingerprinter;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{spawn_watcher, WatchCoordinator, WatchOptions};

/// Capacity of the watcher -> coordinator change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and registry construction
/// - executor backend and fingerprint store
/// - (optional) file watcher and watch coordinator
/// - Ctrl-C handling and long-lived process shutdown
///
/// Returns the result of the last run; `list` and `--dry-run` succeed
/// without running anything.
pub async fn run(args: CliArgs) -> Result<SessionResult> {
    let cfg = load_and_validate(&args.config)?;
    let root = config_root_dir(&args.config);
    let processes = Arc::new(ProcessRegistry::new());
    let registry = Arc::new(TaskRegistry::from_config(&cfg, &root, &processes)?);

    match args.command {
        Command::List => {
            print!("{}", report::render_list(&registry));
            Ok(SessionResult::Succeeded)
        }
        Command::Run(run_args) => {
            let result = run_tasks(&cfg, root, registry, &processes, run_args).await;
            processes.shutdown().await;
            result
        }
    }
}

async fn run_tasks(
    cfg: &ConfigFile,
    root: PathBuf,
    registry: Arc<TaskRegistry>,
    processes: &ProcessRegistry,
    args: RunArgs,
) -> Result<SessionResult> {
    let targets: Vec<TaskName> = if args.tasks.is_empty() {
        vec![cfg.config().default_task.clone()]
    } else {
        args.tasks.clone()
    };

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let fingerprints = Arc::new(Fingerprinter::with_storage(
        Arc::clone(&fs),
        root.clone(),
        cfg.config().fingerprint_storage,
    ));
    let active: Vec<&str> = registry.all().map(|t| t.name.as_str()).collect();
    if let Err(e) = fingerprints.prune(&active) {
        warn!(error = %format!("{e:#}"), "failed to prune stale fingerprints");
    }

    let jobs = args.jobs.unwrap_or(cfg.config().jobs);
    let backend = ActionExecutorBackend::new(fingerprints, jobs).with_force(args.force);
    let mut executor = Executor::new(Arc::clone(&registry), backend)?;

    // Unknown targets and cycles fail here, before anything runs.
    let waves = executor.plan(&targets)?;
    if args.dry_run {
        print!("{}", report::render_plan(&waves, &registry));
        return Ok(SessionResult::Succeeded);
    }

    if args.watch {
        return watch(cfg, root, registry, fs, executor, targets).await;
    }

    let session = executor.run_until_cancelled(&targets, ctrl_c()).await?;
    print!(
        "{}",
        report::render_session(&session, &registry, fs.as_ref(), &root)
    );

    let running = processes.running();
    if !running.is_empty() {
        info!(tasks = ?running, "long-lived processes running; press Ctrl-C to stop");
        ctrl_c().await;
    }

    Ok(session.result())
}

async fn watch(
    cfg: &ConfigFile,
    root: PathBuf,
    registry: Arc<TaskRegistry>,
    fs: Arc<dyn FileSystem>,
    executor: Executor<ActionExecutorBackend>,
    targets: Vec<TaskName>,
) -> Result<SessionResult> {
    let (change_tx, change_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
    let watcher = spawn_watcher(root.clone(), change_tx)?;

    let options = WatchOptions {
        debounce: Duration::from_millis(cfg.config().debounce_ms),
        behaviour: cfg.config().triggered_while_running_behaviour,
    };

    let report_root = root.clone();
    let mut coordinator =
        WatchCoordinator::new(executor, watcher.root().to_path_buf(), targets, options)?
            .with_reporter(move |session| {
                print!(
                    "{}",
                    report::render_session(session, &registry, fs.as_ref(), &report_root)
                );
            });

    let first = coordinator.run_targets().await?;
    info!("watching for changes; press Ctrl-C to stop");
    coordinator.run(change_rx, ctrl_c()).await?;

    let last = coordinator
        .executor()
        .last_session()
        .map(|s| s.result())
        .unwrap_or(first.result());
    Ok(last)
}

/// Resolves on Ctrl-C. Never resolves if the signal handler can't be set.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "web/Wavebuild.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Wavebuild.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
