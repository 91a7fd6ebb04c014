//! In-memory object store
//!
//! Content-addressed with SHA-256 the same way for blobs, trees and commits,
//! so identical content always yields identical ids. Intended for tests and
//! for exercising the scheduler without a git repository.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{CommitInfo, ObjectStore, TreeFile};
use crate::error::{BtError, Result};

/// Flat tree entry: blob id plus executable bit
#[derive(Debug, Clone)]
struct Entry {
    blob: String,
    executable: bool,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, BTreeMap<String, Entry>>,
    commits: HashMap<String, CommitInfo>,
    refs: BTreeMap<String, String>,
    head: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

fn digest(kind: &str, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

impl Inner {
    fn put_tree(&mut self, entries: BTreeMap<String, Entry>) -> String {
        let mut canonical = Vec::new();
        for (path, entry) in &entries {
            let mode = if entry.executable { "100755" } else { "100644" };
            canonical.extend_from_slice(format!("{mode} {path}\0{}\n", entry.blob).as_bytes());
        }
        let id = digest("tree", &canonical);
        self.trees.entry(id.clone()).or_insert(entries);
        id
    }

    /// Resolve a commit or tree id to a tree's entries
    fn tree_of(&self, treeish: &str) -> Result<&BTreeMap<String, Entry>> {
        let tree_id = match self.commits.get(treeish) {
            Some(commit) => commit.tree.as_str(),
            None => treeish,
        };
        self.trees
            .get(tree_id)
            .ok_or_else(|| BtError::store("read tree", format!("unknown object {treeish}")))
    }

    /// Entries below `path`, re-rooted at `path`
    fn subtree(&self, treeish: &str, path: &str) -> Result<BTreeMap<String, Entry>> {
        let path = normalize(path);
        let tree = self.tree_of(treeish)?;
        if path.is_empty() {
            return Ok(tree.clone());
        }
        let prefix = format!("{path}/");
        Ok(tree
            .iter()
            .filter_map(|(p, e)| p.strip_prefix(&prefix).map(|rel| (rel.to_string(), e.clone())))
            .collect())
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| BtError::store("lock", "memory store mutex poisoned"))
    }

    /// Record a new source revision on top of the current one and make it current.
    pub fn commit_source(&self, files: &[TreeFile], message: &str) -> Result<String> {
        let tree = self.create_tree(files)?;
        let parents: Vec<String> = self.lock()?.head.iter().cloned().collect();
        let commit = self.create_commit(&tree, message, &parents)?;
        self.lock()?.head = Some(commit.clone());
        Ok(commit)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn current_revision(&self) -> Result<String> {
        self.lock()?
            .head
            .clone()
            .ok_or_else(|| BtError::store("current revision", "no commits yet"))
    }

    fn read_tree(&self, treeish: &str, path: &str) -> Result<Vec<TreeFile>> {
        let inner = self.lock()?;
        let entries = inner.subtree(treeish, path)?;
        entries
            .into_iter()
            .map(|(path, entry)| {
                let contents = inner.blobs.get(&entry.blob).cloned().ok_or_else(|| {
                    BtError::store("read tree", format!("missing blob {}", entry.blob))
                })?;
                Ok(TreeFile {
                    path,
                    contents,
                    executable: entry.executable,
                })
            })
            .collect()
    }

    fn read_blob(&self, treeish: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.lock()?;
        let tree = inner.tree_of(treeish)?;
        Ok(tree
            .get(normalize(path))
            .and_then(|entry| inner.blobs.get(&entry.blob).cloned()))
    }

    fn resolve_path(&self, treeish: &str, path: &str) -> Result<Option<String>> {
        let mut inner = self.lock()?;
        let path = normalize(path);
        if let Some(entry) = inner.tree_of(treeish)?.get(path) {
            return Ok(Some(entry.blob.clone()));
        }
        let entries = inner.subtree(treeish, path)?;
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(inner.put_tree(entries)))
    }

    fn create_tree(&self, files: &[TreeFile]) -> Result<String> {
        let mut inner = self.lock()?;
        let mut entries = BTreeMap::new();
        for file in files {
            let blob = digest("blob", &file.contents);
            inner
                .blobs
                .entry(blob.clone())
                .or_insert_with(|| file.contents.clone());
            entries.insert(
                normalize(&file.path).to_string(),
                Entry {
                    blob,
                    executable: file.executable,
                },
            );
        }
        Ok(inner.put_tree(entries))
    }

    fn create_commit(&self, tree: &str, message: &str, parents: &[String]) -> Result<String> {
        let mut inner = self.lock()?;
        if !inner.trees.contains_key(tree) {
            return Err(BtError::store("create commit", format!("unknown tree {tree}")));
        }
        if let Some(missing) = parents.iter().find(|p| !inner.commits.contains_key(*p)) {
            return Err(BtError::store(
                "create commit",
                format!("unknown parent {missing}"),
            ));
        }
        let canonical = format!("tree {tree}\nparents {}\n\n{message}", parents.join(" "));
        let id = digest("commit", canonical.as_bytes());
        inner.commits.entry(id.clone()).or_insert_with(|| CommitInfo {
            tree: tree.to_string(),
            parents: parents.to_vec(),
            message: message.to_string(),
        });
        Ok(id)
    }

    fn read_commit(&self, commit: &str) -> Result<CommitInfo> {
        self.lock()?
            .commits
            .get(commit)
            .cloned()
            .ok_or_else(|| BtError::store("read commit", format!("unknown commit {commit}")))
    }

    fn create_ref_if_absent(&self, name: &str, commit: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        if !inner.commits.contains_key(commit) {
            return Err(BtError::store("create ref", format!("unknown commit {commit}")));
        }
        if inner.refs.contains_key(name) {
            return Ok(false);
        }
        inner.refs.insert(name.to_string(), commit.to_string());
        Ok(true)
    }

    fn resolve_ref(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lock()?.refs.get(name).cloned())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .lock()?
            .refs
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, commit)| (name.clone(), commit.clone()))
            .collect())
    }

    fn revision_history(&self, count: usize) -> Result<Vec<String>> {
        let inner = self.lock()?;
        let mut history = Vec::new();
        let mut next = inner.head.clone();
        while let Some(commit) = next {
            if history.len() >= count {
                break;
            }
            next = inner
                .commits
                .get(&commit)
                .and_then(|c| c.parents.first().cloned());
            history.push(commit);
        }
        Ok(history)
    }
}
