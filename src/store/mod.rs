//! Object store abstraction and the build-record store built on top of it
//!
//! This module provides:
//! - `ObjectStore`: the version-control primitives bt needs (trees, commits, refs)
//! - `MemoryObjectStore`: an in-memory implementation for tests
//! - `ResultStore`: write-once build records keyed by (revision, stage)

pub mod memory;
pub mod results;

pub use memory::MemoryObjectStore;
pub use results::{BuildRecord, ResultStore, Status, FAIL_MESSAGE, PASS_MESSAGE, REF_PREFIX};

use crate::error::Result;

/// A file inside a tree object, with its path relative to the tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    pub path: String,
    pub contents: Vec<u8>,
    pub executable: bool,
}

impl TreeFile {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            executable: false,
        }
    }

    pub fn executable(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            executable: true,
            ..Self::new(path, contents)
        }
    }
}

/// Parsed commit object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub tree: String,
    pub parents: Vec<String>,
    pub message: String,
}

/// Version-control primitives required by the scheduler.
///
/// Implementations must make `create_ref_if_absent` atomic: of several
/// concurrent calls for the same name exactly one returns `true`. A ref, once
/// created, is never moved by bt.
pub trait ObjectStore: Send + Sync {
    /// Commit id of the revision to build (HEAD)
    fn current_revision(&self) -> Result<String>;

    /// All files below `path` in a commit or tree, recursively, sorted by path.
    ///
    /// Paths are relative to `path`. An absent path yields an empty listing.
    fn read_tree(&self, treeish: &str, path: &str) -> Result<Vec<TreeFile>>;

    /// Contents of the single file at `path`, if there is one
    fn read_blob(&self, treeish: &str, path: &str) -> Result<Option<Vec<u8>>>;

    /// Object id of the entry at `path` in a commit or tree
    fn resolve_path(&self, treeish: &str, path: &str) -> Result<Option<String>>;

    fn create_tree(&self, files: &[TreeFile]) -> Result<String>;

    fn create_commit(&self, tree: &str, message: &str, parents: &[String]) -> Result<String>;

    fn read_commit(&self, commit: &str) -> Result<CommitInfo>;

    /// Create `name` pointing at `commit` unless it already exists.
    ///
    /// Returns `false` when the ref was already present.
    fn create_ref_if_absent(&self, name: &str, commit: &str) -> Result<bool>;

    fn resolve_ref(&self, name: &str) -> Result<Option<String>>;

    /// All refs under `prefix` as (full name, commit id) pairs
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Most recent revisions reachable from the current one, newest first
    fn revision_history(&self, count: usize) -> Result<Vec<String>>;
}
