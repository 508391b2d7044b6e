// src/fingerprint/store.rs

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::engine::TaskName;

/// Relative path (from the project root) to the fingerprint file.
///
/// The effective path on disk is `<root>/.wavebuild/fingerprints`, one
/// `<task> <digest>` pair per line.
pub const FINGERPRINT_FILE_PATH: &str = ".wavebuild/fingerprints";

fn fingerprint_file_path(root: &Path) -> PathBuf {
    root.join(FINGERPRINT_FILE_PATH)
}

/// Abstract storage for the last successful input fingerprint of each task.
pub trait FingerprintStore: Send + Sync {
    fn load(&self, task: &str) -> Result<Option<String>>;
    fn save(&mut self, task: &str, digest: &str) -> Result<()>;
    /// Drop the stored fingerprint, forcing the next run of `task`.
    fn forget(&mut self, task: &str) -> Result<()>;
    /// Remove fingerprints for tasks that are not in `active_tasks`.
    fn prune(&mut self, active_tasks: &[&str]) -> Result<()>;
}

/// Stores fingerprints in `<root>/.wavebuild/fingerprints`.
pub struct FileFingerprintStore {
    root: PathBuf,
}

impl FileFingerprintStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl FingerprintStore for FileFingerprintStore {
    fn load(&self, task: &str) -> Result<Option<String>> {
        let map = load_all(&self.root)?;
        Ok(map.get(task).cloned())
    }

    fn save(&mut self, task: &str, digest: &str) -> Result<()> {
        let mut map = load_all(&self.root)?;
        map.insert(task.to_string(), digest.to_string());
        save_all(&self.root, &map)?;
        debug!(task = %task, digest = %digest, "stored task fingerprint (file)");
        Ok(())
    }

    fn forget(&mut self, task: &str) -> Result<()> {
        let mut map = load_all(&self.root)?;
        if map.remove(task).is_some() {
            save_all(&self.root, &map)?;
        }
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let mut map = load_all(&self.root)?;
        let initial_len = map.len();
        map.retain(|k, _| active_tasks.contains(&k.as_str()));

        if map.len() < initial_len {
            save_all(&self.root, &map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale task fingerprints (file)"
            );
        }
        Ok(())
    }
}

/// Stores fingerprints in memory only; every process starts cold.
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    map: BTreeMap<TaskName, String>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn load(&self, task: &str) -> Result<Option<String>> {
        Ok(self.map.get(task).cloned())
    }

    fn save(&mut self, task: &str, digest: &str) -> Result<()> {
        self.map.insert(task.to_string(), digest.to_string());
        debug!(task = %task, digest = %digest, "stored task fingerprint (memory)");
        Ok(())
    }

    fn forget(&mut self, task: &str) -> Result<()> {
        self.map.remove(task);
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active_tasks.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale task fingerprints (memory)"
            );
        }
        Ok(())
    }
}

fn load_all(root: &Path) -> Result<BTreeMap<TaskName, String>> {
    let path = fingerprint_file_path(root);

    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let file =
        File::open(&path).with_context(|| format!("opening fingerprint file at {:?}", path))?;
    let reader = BufReader::new(file);

    let mut map = BTreeMap::new();
    for line_res in reader.lines() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((name, digest)) = trimmed.rsplit_once(char::is_whitespace) {
            map.insert(name.trim().to_string(), digest.to_string());
        }
    }

    Ok(map)
}

fn save_all(root: &Path, map: &BTreeMap<TaskName, String>) -> Result<()> {
    let path = fingerprint_file_path(root);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating fingerprint directory at {:?}", parent))?;
    }

    let file =
        File::create(&path).with_context(|| format!("creating fingerprint file at {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for (name, digest) in map {
        writeln!(writer, "{} {}", name, digest)?;
    }

    writer.flush()?;
    Ok(())
}
