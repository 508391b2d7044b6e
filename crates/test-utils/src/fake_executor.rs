use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use wavebuild::dag::ScheduledTask;
use wavebuild::engine::{FailureReason, RuntimeEvent, TaskOutcome};
use wavebuild::errors::Result;
use wavebuild::exec::ExecutorBackend;

/// A fake executor backend that:
/// - records which tasks were dispatched, in dispatch order
/// - reports `TaskCompleted` for each one from a spawned Tokio task,
///   failing the names in `failing` and succeeding the rest.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn new(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            executed,
            failing: HashSet::new(),
            delay: None,
        }
    }

    /// Make the given task fail with an action error.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    /// Wait this long before reporting each completion.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();
        let delay = self.delay;

        Box::pin(async move {
            for t in tasks {
                let name = t.name().to_string();
                executed.lock().unwrap().push(name.clone());

                let outcome = if failing.contains(&name) {
                    TaskOutcome::Failed(FailureReason::Action("boom".to_string()))
                } else {
                    TaskOutcome::Succeeded
                };

                let events = events.clone();
                tokio::spawn(async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = events
                        .send(RuntimeEvent::TaskStarted { task: name.clone() })
                        .await;
                    let _ = events
                        .send(RuntimeEvent::TaskCompleted { task: name, outcome })
                        .await;
                });
            }
            Ok(())
        })
    }
}
