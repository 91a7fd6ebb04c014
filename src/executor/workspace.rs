//! Scratch working directories for stage runs

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::{BtError, Result};
use crate::store::{ObjectStore, TreeFile};

/// Characters that make a result entry a glob pattern rather than a path
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// A temporary directory holding a revision's source tree.
///
/// Removed when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a clean directory containing the revision's files
    pub fn materialize(store: &dyn ObjectStore, revision: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("bt-").tempdir()?;
        let workspace = Self { dir };
        let files = store.read_tree(revision, "")?;
        debug!(revision, files = files.len(), path = %workspace.path().display(), "materializing workspace");
        workspace.overlay(&files)?;
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write files into the workspace, replacing whatever is at their paths
    pub fn overlay(&self, files: &[TreeFile]) -> Result<()> {
        for file in files {
            self.write_file(file)?;
        }
        Ok(())
    }

    fn write_file(&self, file: &TreeFile) -> Result<()> {
        let target = self.resolve(&file.path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if target.is_dir() {
            fs::remove_dir_all(&target)?;
        }
        fs::write(&target, &file.contents)?;
        let mode = if file.executable { 0o755 } else { 0o644 };
        fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    /// Join a tree path onto the workspace root, refusing paths that escape it
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || relative.is_empty() {
            return Err(BtError::store(
                "materialize",
                format!("refusing to write outside the workspace: {relative:?}"),
            ));
        }
        Ok(self.path().join(path))
    }

    /// Gather the files named by `patterns`.
    ///
    /// Literal paths may name a file or a directory (all files below it).
    /// Patterns with glob characters must match at least one path. Any
    /// entry that matches nothing is a `MissingResult` for `stage`.
    pub fn collect(&self, stage: &str, patterns: &[String]) -> Result<Vec<TreeFile>> {
        let mut found: BTreeMap<String, TreeFile> = BTreeMap::new();

        for pattern in patterns {
            let missing = || BtError::MissingResult {
                stage: stage.to_string(),
                path: pattern.clone(),
            };

            let matches: Vec<PathBuf> = if pattern.contains(GLOB_CHARS) {
                let root = glob::Pattern::escape(&self.path().to_string_lossy());
                let full = format!("{root}/{pattern}");
                glob::glob(&full)
                    .map_err(|e| {
                        BtError::malformed(stage, format!("bad result pattern {pattern:?}: {e}"))
                    })?
                    .filter_map(|entry| entry.ok())
                    .collect()
            } else {
                let path = self.resolve(pattern)?;
                if path.exists() {
                    vec![path]
                } else {
                    Vec::new()
                }
            };

            let mut collected = 0;
            for path in matches {
                collected += self.collect_path(&path, &mut found)?;
            }
            // Empty directories cannot be stored, so they count as missing too
            if collected == 0 {
                return Err(missing());
            }
        }

        Ok(found.into_values().collect())
    }

    /// Add the file at `path`, or every file below it, returning how many were seen
    fn collect_path(&self, path: &Path, found: &mut BTreeMap<String, TreeFile>) -> Result<usize> {
        if path.is_dir() {
            let mut entries: Vec<_> = fs::read_dir(path)?.collect::<std::io::Result<_>>()?;
            entries.sort_by_key(|e| e.file_name());
            let mut count = 0;
            for entry in entries {
                count += self.collect_path(&entry.path(), found)?;
            }
            return Ok(count);
        }

        let relative = path
            .strip_prefix(self.path())
            .map_err(|_| {
                BtError::store(
                    "collect",
                    format!("{} is outside the workspace", path.display()),
                )
            })?;
        let relative = relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let contents = fs::read(path)?;
        let executable = fs::metadata(path)?.permissions().mode() & 0o111 != 0;
        found.insert(
            relative.clone(),
            TreeFile {
                path: relative,
                contents,
                executable,
            },
        );
        Ok(1)
    }
}
