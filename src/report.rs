// src/report.rs

//! Human-readable output for `run`, `run --dry-run` and `list`.
//!
//! Everything here renders to a `String`; the caller decides where it goes
//! (stdout for the CLI).

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::dag::{TaskRegistry, Waves};
use crate::engine::{RunSession, TaskStatus};
use crate::fs::FileSystem;
use crate::watch::patterns::collect_output_files;

/// File count and total byte size of a task's declared outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputSize {
    pub files: usize,
    pub bytes: u64,
}

pub fn output_size(fs: &dyn FileSystem, root: &Path, outputs: &[String]) -> Result<OutputSize> {
    let mut size = OutputSize::default();
    for path in collect_output_files(fs, root, outputs)? {
        size.files += 1;
        size.bytes += fs.stamp(&path)?.len;
    }
    Ok(size)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn format_duration(d: Duration) -> String {
    if d.as_secs() >= 60 {
        format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60)
    } else if d.as_millis() >= 1000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Per-task status and duration in wave order, totals, then output sizes
/// of `report_size` tasks that succeeded.
pub fn render_session(
    session: &RunSession,
    registry: &TaskRegistry,
    fs: &dyn FileSystem,
    root: &Path,
) -> String {
    let mut out = String::new();
    let width = session
        .results()
        .iter()
        .map(|r| r.task.len())
        .max()
        .unwrap_or(4)
        .max(4);

    for r in session.results() {
        let time = match r.status {
            TaskStatus::Succeeded | TaskStatus::Failed => {
                r.duration().map(format_duration).unwrap_or_default()
            }
            _ => String::new(),
        };
        let _ = write!(
            out,
            "[{}] {:<width$}  {:<7}  {:>8}",
            r.wave,
            r.task,
            r.status.label(),
            time
        );
        if let Some(failure) = &r.failure {
            let _ = write!(out, "  {failure}");
        }
        out.push('\n');
    }

    let counts = session.counts();
    let _ = writeln!(
        out,
        "{} tasks: {} ok, {} skipped, {} failed, {} blocked in {}",
        session.results().len(),
        counts.succeeded,
        counts.skipped,
        counts.failed,
        counts.blocked,
        format_duration(session.elapsed())
    );

    for r in session.results() {
        if !r.status.is_success() {
            continue;
        }
        let Ok(task) = registry.get(&r.task) else {
            continue;
        };
        if !task.report_size {
            continue;
        }
        match output_size(fs, root, &task.outputs) {
            Ok(size) => {
                let _ = writeln!(
                    out,
                    "size {}: {} files, {}",
                    task.name,
                    size.files,
                    format_bytes(size.bytes)
                );
            }
            Err(e) => {
                let _ = writeln!(out, "size {}: unavailable ({e:#})", task.name);
            }
        }
    }

    out
}

/// Waves a run would execute.
pub fn render_plan(waves: &Waves, registry: &TaskRegistry) -> String {
    let mut out = String::new();
    for (idx, wave) in waves.iter().enumerate() {
        let _ = writeln!(out, "wave {idx}:");
        for name in wave {
            let describe = registry
                .get(name)
                .map(|t| t.action.describe())
                .unwrap_or_default();
            let _ = writeln!(out, "  {name}  ({describe})");
        }
    }
    out
}

/// Every registered task with its dependencies and inputs.
pub fn render_list(registry: &TaskRegistry) -> String {
    let mut out = String::new();
    for task in registry.all() {
        let _ = writeln!(out, "{}", task.name);
        let _ = writeln!(out, "    action: {}", task.action.describe());
        if !task.dependencies.is_empty() {
            let deps: Vec<&str> = task.dependencies.iter().map(String::as_str).collect();
            let _ = writeln!(out, "    depends_on: {}", deps.join(", "));
        }
        if !task.inputs.is_empty() {
            let _ = writeln!(out, "    inputs: {}", task.inputs.join(", "));
        }
        if !task.outputs.is_empty() {
            let _ = writeln!(out, "    outputs: {}", task.outputs.join(", "));
        }
        if !task.parallel {
            let _ = writeln!(out, "    parallel: false");
        }
    }
    out
}
