// src/watch/patterns.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::engine::TaskName;
use crate::fs::FileSystem;

/// Directories never descended into while collecting files.
const SKIPPED_DIRS: &[&str] = &[".git", crate::fingerprint::STATE_DIR];

/// A file matched by a task's input globs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    /// Path as seen by the filesystem (`root` joined with the relative path).
    pub path: PathBuf,
    /// Path relative to the base of the glob that matched it, e.g.
    /// `fonts/a.woff` for `app/fonts/a.woff` matched by `app/**/*.woff`.
    pub relative: PathBuf,
}

#[derive(Clone)]
struct IncludeGlob {
    base: String,
    matcher: GlobMatcher,
}

/// Compiled input globs for a single task.
///
/// Patterns are relative to the project root. A leading `!` marks an
/// exclusion (`"!app/*.html"`). `*` does not cross `/`; use `**` for that.
#[derive(Clone)]
pub struct InputProfile {
    name: TaskName,
    include: Vec<IncludeGlob>,
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for InputProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputProfile")
            .field("name", &self.name)
            .field("include", &self.include.len())
            .finish_non_exhaustive()
    }
}

impl InputProfile {
    pub fn new(name: impl Into<TaskName>, patterns: &[String]) -> Result<Self> {
        let name = name.into();
        let mut include = Vec::new();
        let mut include_builder = GlobSetBuilder::new();
        let mut exclude_builder = GlobSetBuilder::new();
        let mut has_exclude = false;

        for raw in patterns {
            if let Some(negated) = raw.strip_prefix('!') {
                exclude_builder.add(
                    GlobBuilder::new(negated)
                        .literal_separator(true)
                        .build()
                        .with_context(|| format!("invalid glob pattern: {raw}"))?,
                );
                has_exclude = true;
                continue;
            }

            let glob = GlobBuilder::new(raw)
                .literal_separator(true)
                .build()
                .with_context(|| format!("invalid glob pattern: {raw}"))?;
            include.push(IncludeGlob {
                base: glob_base(raw),
                matcher: glob.compile_matcher(),
            });
            include_builder.add(glob);
        }

        let include_set = include_builder
            .build()
            .with_context(|| format!("building input globset for task {name}"))?;
        let exclude_set = if has_exclude {
            Some(
                exclude_builder
                    .build()
                    .with_context(|| format!("building exclude globset for task {name}"))?,
            )
        } else {
            None
        };

        Ok(Self {
            name,
            include,
            include_set,
            exclude_set,
        })
    }

    /// Name of the task this profile belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the task declares no (positive) input globs.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    /// Returns true if the given root-relative path (`"app/styles/a.scss"`)
    /// is one of this task's inputs.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Base directory of the first include glob matching `rel_path`.
    pub fn base_for(&self, rel_path: &str) -> Option<&str> {
        self.include
            .iter()
            .find(|g| g.matcher.is_match(rel_path))
            .map(|g| g.base.as_str())
    }

    /// Directories to walk when collecting inputs, with nested ones removed.
    fn search_roots(&self) -> Vec<&str> {
        let bases: BTreeSet<&str> = self.include.iter().map(|g| g.base.as_str()).collect();
        let mut roots: Vec<&str> = Vec::new();
        for base in bases {
            let nested = roots
                .iter()
                .any(|r| r.is_empty() || Path::new(base).starts_with(r));
            if !nested {
                roots.push(base);
            }
        }
        roots
    }
}

/// Literal directory prefix of a glob: everything before the first path
/// component containing a glob metacharacter. For a literal file path this
/// is its parent directory.
///
/// `app/fonts/**/*.woff` -> `app/fonts`, `app/*.html` -> `app`,
/// `app/styles/main.scss` -> `app/styles`, `*.txt` -> ``.
pub fn glob_base(pattern: &str) -> String {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal_len = components
        .iter()
        .position(|c| has_glob_meta(c))
        .unwrap_or(components.len().saturating_sub(1));
    components[..literal_len].join("/")
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Convert a path under `root` into a forward-slash relative string.
fn rel_string(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

fn join_rel(root: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// Walk everything below `start` (or `start` itself when it is a file),
/// returning file paths.
fn walk_files(fs: &dyn FileSystem, start: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if fs.is_file(start) {
        files.push(start.to_path_buf());
        return Ok(files);
    }
    if !fs.is_dir(start) {
        return Ok(files);
    }

    let mut stack = vec![start.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                let skipped = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| SKIPPED_DIRS.contains(&n));
                if !skipped {
                    stack.push(path);
                }
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// Collect all files under `root` matching this profile, sorted by path.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    profile: &InputProfile,
) -> Result<Vec<InputFile>> {
    let mut seen = BTreeSet::new();
    let mut files = Vec::new();

    for base in profile.search_roots() {
        for path in walk_files(fs, &join_rel(root, base))? {
            let Some(rel) = rel_string(root, &path) else {
                continue;
            };
            if !profile.matches(&rel) || !seen.insert(path.clone()) {
                continue;
            }
            let glob_base = profile.base_for(&rel).unwrap_or("");
            let relative = Path::new(&rel)
                .strip_prefix(glob_base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(&rel));
            files.push(InputFile { path, relative });
        }
    }

    files.sort();
    Ok(files)
}

/// Resolve declared outputs (paths, directories or globs) to the files that
/// currently exist for them.
pub fn collect_output_files(
    fs: &dyn FileSystem,
    root: &Path,
    outputs: &[String],
) -> Result<Vec<PathBuf>> {
    let mut found = BTreeSet::new();
    for output in outputs {
        if has_glob_meta(output) {
            let profile = InputProfile::new("outputs", std::slice::from_ref(output))?;
            found.extend(
                collect_matching_files(fs, root, &profile)?
                    .into_iter()
                    .map(|f| f.path),
            );
        } else {
            found.extend(walk_files(fs, &join_rel(root, output))?);
        }
    }
    Ok(found.into_iter().collect())
}

/// Declared outputs for which nothing exists on disk.
pub fn missing_outputs(fs: &dyn FileSystem, root: &Path, outputs: &[String]) -> Vec<String> {
    outputs
        .iter()
        .filter(|output| {
            collect_output_files(fs, root, std::slice::from_ref(*output))
                .map(|files| files.is_empty())
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}
