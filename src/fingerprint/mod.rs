// src/fingerprint/mod.rs

//! Input fingerprints: what decides whether a task may be skipped.
//!
//! A fingerprint is a blake3 digest over the sorted set of a task's input
//! files (relative path plus content hash). A task's fingerprint also folds
//! in the fingerprints last recorded for its dependencies, so rebuilding an
//! upstream task in another invocation invalidates its dependents. The last
//! fingerprint recorded after a successful run is kept in a
//! [`FingerprintStore`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::engine::TaskName;
use crate::fs::FileSystem;
use crate::types::FingerprintStorage;
use crate::watch::patterns::{collect_matching_files, InputFile, InputProfile};

pub mod file_cache;
pub mod hash;
pub mod store;

pub use file_cache::FileCache;
pub use hash::{compute_aggregate_hash, compute_file_hash};
pub use store::{FileFingerprintStore, FingerprintStore, MemoryFingerprintStore};

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".wavebuild";

/// Result of fingerprinting a task's inputs.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub inputs: Vec<InputFile>,
    pub digest: String,
}

/// Computes, caches and persists task fingerprints.
///
/// All methods are blocking; async callers go through `spawn_blocking`.
pub struct Fingerprinter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    files: Mutex<FileCache>,
    store: Mutex<Box<dyn FingerprintStore>>,
}

impl std::fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fingerprinter")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Fingerprinter {
    pub fn new(fs: Arc<dyn FileSystem>, root: PathBuf, store: Box<dyn FingerprintStore>) -> Self {
        Self {
            fs,
            root,
            files: Mutex::new(FileCache::new()),
            store: Mutex::new(store),
        }
    }

    /// Fingerprinter backed by the store selected in `[config]`.
    pub fn with_storage(fs: Arc<dyn FileSystem>, root: PathBuf, storage: FingerprintStorage) -> Self {
        let store: Box<dyn FingerprintStore> = match storage {
            FingerprintStorage::File => Box::new(FileFingerprintStore::new(root.clone())),
            FingerprintStorage::Memory => Box::new(MemoryFingerprintStore::new()),
        };
        Self::new(fs, root, store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Resolve the profile's inputs and digest them.
    pub fn compute(&self, profile: &InputProfile) -> Result<Fingerprint> {
        let inputs = collect_matching_files(self.fs.as_ref(), &self.root, profile)?;

        let mut entries = Vec::with_capacity(inputs.len());
        {
            let mut cache = self
                .files
                .lock()
                .map_err(|_| anyhow!("file hash cache lock poisoned"))?;
            for input in &inputs {
                let rel = input
                    .path
                    .strip_prefix(&self.root)
                    .unwrap_or(&input.path)
                    .to_string_lossy()
                    .replace('\\', "/");
                let hash = cache.get_or_compute(self.fs.as_ref(), &input.path)?;
                entries.push((rel, hash));
            }
        }

        let digest = compute_aggregate_hash(entries.iter().map(|(p, h)| (p.as_str(), h.as_str())));
        Ok(Fingerprint { inputs, digest })
    }

    /// Fingerprint a task: its own inputs plus the digests currently stored
    /// for each of its dependencies. An empty input set still has a digest.
    pub fn compute_task(
        &self,
        profile: &InputProfile,
        dependencies: &BTreeSet<TaskName>,
    ) -> Result<Fingerprint> {
        let own = self.compute(profile)?;
        if dependencies.is_empty() {
            return Ok(own);
        }

        let mut entries = vec![("inputs".to_string(), own.digest)];
        self.with_store(|store| {
            for dep in dependencies {
                let stored = store.load(dep)?.unwrap_or_else(|| "-".to_string());
                entries.push((format!("after:{dep}"), stored));
            }
            Ok(())
        })?;

        let digest = compute_aggregate_hash(entries.iter().map(|(k, d)| (k.as_str(), d.as_str())));
        Ok(Fingerprint {
            inputs: own.inputs,
            digest,
        })
    }

    pub fn stored(&self, task: &str) -> Result<Option<String>> {
        self.with_store(|store| store.load(task))
    }

    pub fn record(&self, task: &str, digest: &str) -> Result<()> {
        self.with_store(|store| store.save(task, digest))
    }

    pub fn forget(&self, task: &str) -> Result<()> {
        self.with_store(|store| store.forget(task))
    }

    pub fn prune(&self, active_tasks: &[&str]) -> Result<()> {
        self.with_store(|store| store.prune(active_tasks))
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut dyn FingerprintStore) -> Result<T>) -> Result<T> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| anyhow!("fingerprint store lock poisoned"))?;
        f(store.as_mut())
    }
}
