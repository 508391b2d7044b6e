// src/fingerprint/file_cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::fingerprint::hash::compute_file_hash;
use crate::fs::{FileStamp, FileSystem};

/// In-memory cache of file hashes.
///
/// Entries are keyed by path and remembered together with the file's
/// [`FileStamp`]; a file is only re-read when its size or mtime changed.
#[derive(Debug, Default)]
pub struct FileCache {
    hashes: HashMap<PathBuf, (FileStamp, String)>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the hash for a file, computing and caching it if necessary.
    pub fn get_or_compute(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<String> {
        let stamp = fs.stamp(path)?;
        if let Some((cached_stamp, hash)) = self.hashes.get(path) {
            if *cached_stamp == stamp {
                return Ok(hash.clone());
            }
        }

        debug!("cache miss: computing hash for {:?}", path);
        let hash = compute_file_hash(fs, path)?;
        self.hashes.insert(path.to_path_buf(), (stamp, hash.clone()));
        Ok(hash)
    }

    /// Invalidate the cached hash for a file (e.g. on change).
    pub fn invalidate(&mut self, path: &Path) {
        if self.hashes.remove(path).is_some() {
            debug!("invalidated cache for {:?}", path);
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
