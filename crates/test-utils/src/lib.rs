pub mod builders;
pub mod fake_executor;

use std::sync::{Arc, Mutex, Once};

use tracing_subscriber::{fmt, EnvFilter};
use wavebuild::dag::{Task, TaskRegistry};
use wavebuild::exec::{action_fn, GroupAction, TaskAction};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Shared log of task names, appended to by [`recording_action`].
pub type RunLog = Arc<Mutex<Vec<String>>>;

pub fn run_log() -> RunLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Action that appends the task name to `log` and succeeds.
pub fn recording_action(log: &RunLog) -> Arc<dyn TaskAction> {
    let log = Arc::clone(log);
    action_fn("record", move |ctx| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(ctx.task);
            Ok(())
        }
    })
}

/// Action that appends the task name to `log` and then fails.
pub fn failing_action(log: &RunLog) -> Arc<dyn TaskAction> {
    let log = Arc::clone(log);
    action_fn("fail", move |ctx| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(ctx.task.clone());
            anyhow::bail!("{} exploded", ctx.task)
        }
    })
}

/// Registry of group tasks from `(name, deps)` pairs.
pub fn group_registry(specs: &[(&str, &[&str])]) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    for (name, deps) in specs {
        registry
            .register(Task::new(*name, Arc::new(GroupAction)).depends_on(deps.iter().copied()))
            .expect("duplicate task in group_registry");
    }
    registry
}
