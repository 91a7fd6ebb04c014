//! `ObjectStore` implementation on top of git plumbing commands

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::check_git_available;
use super::runner::{
    run_git, run_git_bool, run_git_bytes, run_git_checked, run_git_env, run_git_with_input,
};
use crate::error::{BtError, Result};
use crate::store::{CommitInfo, ObjectStore, TreeFile};

/// Attempts at creating a ref while another writer holds its lock
const REF_LOCK_RETRIES: u32 = 20;
const REF_LOCK_DELAY: Duration = Duration::from_millis(25);

/// Tree entry mode git uses for symbolic links
const SYMLINK_MODE: &str = "120000";

/// Identity used for record commits
const COMMITTER: [&str; 4] = ["-c", "user.name=bt", "-c", "user.email=bt@localhost"];

/// Git repository used as bt's object store
#[derive(Debug, Clone)]
pub struct GitObjectStore {
    repo_root: PathBuf,
}

/// One line of `git ls-tree -r -z`
struct LsTreeEntry {
    mode: String,
    kind: String,
    object: String,
    path: String,
}

fn parse_ls_tree(raw: &[u8]) -> Vec<LsTreeEntry> {
    raw.split(|b| *b == 0)
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let record = String::from_utf8_lossy(record);
            let (meta, path) = record.split_once('\t')?;
            let mut parts = meta.split(' ');
            Some(LsTreeEntry {
                mode: parts.next()?.to_string(),
                kind: parts.next()?.to_string(),
                object: parts.next()?.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}

fn parse_commit(commit: &str, raw: &str) -> Result<CommitInfo> {
    let (headers, message) = raw.split_once("\n\n").unwrap_or((raw, ""));
    let mut tree = None;
    let mut parents = Vec::new();
    for line in headers.lines() {
        if let Some(id) = line.strip_prefix("tree ") {
            tree = Some(id.to_string());
        } else if let Some(id) = line.strip_prefix("parent ") {
            parents.push(id.to_string());
        }
    }
    let tree = tree.ok_or_else(|| {
        BtError::store("read commit", format!("commit {commit} has no tree header"))
    })?;
    Ok(CommitInfo {
        tree,
        parents,
        message: message.trim_end_matches('\n').to_string(),
    })
}

/// `<treeish>:<path>` revision syntax, or the root tree for an empty path
fn object_spec(treeish: &str, path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        format!("{treeish}^{{tree}}")
    } else {
        format!("{treeish}:{path}")
    }
}

impl GitObjectStore {
    /// Open the repository containing `path`
    pub fn open(path: &Path) -> Result<Self> {
        check_git_available()?;
        if !run_git_bool(&["rev-parse", "--git-dir"], path) {
            return Err(BtError::store(
                "open",
                format!("{} is not inside a git repository", path.display()),
            ));
        }
        Ok(Self {
            repo_root: path.to_path_buf(),
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        run_git_checked(args, &self.repo_root)
    }

    fn object_type(&self, object: &str) -> Result<String> {
        self.git(&["cat-file", "-t", object])
    }

    fn blob(&self, object: &str) -> Result<Vec<u8>> {
        run_git_bytes(&["cat-file", "blob", object], &self.repo_root)
    }
}

impl ObjectStore for GitObjectStore {
    fn current_revision(&self) -> Result<String> {
        self.git(&["rev-parse", "--verify", "HEAD^{commit}"])
    }

    fn read_tree(&self, treeish: &str, path: &str) -> Result<Vec<TreeFile>> {
        let Some(tree) = self.resolve_path(treeish, path)? else {
            return Ok(Vec::new());
        };
        if self.object_type(&tree)? != "tree" {
            return Ok(Vec::new());
        }

        let raw = run_git_bytes(&["ls-tree", "-r", "-z", &tree], &self.repo_root)?;
        let mut files = Vec::new();
        for entry in parse_ls_tree(&raw) {
            // Submodule links have no content in this repository
            if entry.kind != "blob" {
                debug!(path = %entry.path, kind = %entry.kind, "skipping non-blob tree entry");
                continue;
            }
            if entry.mode == SYMLINK_MODE {
                debug!(path = %entry.path, "skipping symlink");
                continue;
            }
            files.push(TreeFile {
                contents: self.blob(&entry.object)?,
                executable: entry.mode == "100755",
                path: entry.path,
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn read_blob(&self, treeish: &str, path: &str) -> Result<Option<Vec<u8>>> {
        match self.resolve_path(treeish, path)? {
            Some(object) if self.object_type(&object)? == "blob" => Ok(Some(self.blob(&object)?)),
            _ => Ok(None),
        }
    }

    fn resolve_path(&self, treeish: &str, path: &str) -> Result<Option<String>> {
        let spec = object_spec(treeish, path);
        let output = run_git(&["rev-parse", "--verify", "--quiet", &spec], &self.repo_root)?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn create_tree(&self, files: &[TreeFile]) -> Result<String> {
        // A private index keeps concurrent writers and the user's index apart
        let scratch = tempfile::tempdir()?;
        let index = scratch.path().join("index");
        let env = [("GIT_INDEX_FILE", index.as_path())];

        let mut index_info = Vec::new();
        for file in files {
            let blob = run_git_with_input(
                &["hash-object", "-w", "--stdin"],
                &self.repo_root,
                &[],
                &file.contents,
            )?;
            let mode = if file.executable { "100755" } else { "100644" };
            index_info.extend_from_slice(
                format!("{mode} {blob}\t{}\0", file.path.trim_matches('/')).as_bytes(),
            );
        }

        if !index_info.is_empty() {
            run_git_with_input(
                &["update-index", "-z", "--add", "--index-info"],
                &self.repo_root,
                &env,
                &index_info,
            )?;
        }
        run_git_env(&["write-tree"], &self.repo_root, &env)
    }

    fn create_commit(&self, tree: &str, message: &str, parents: &[String]) -> Result<String> {
        let mut args: Vec<&str> = COMMITTER.to_vec();
        args.extend(["commit-tree", tree, "-m", message]);
        for parent in parents {
            args.extend(["-p", parent.as_str()]);
        }
        self.git(&args)
    }

    fn read_commit(&self, commit: &str) -> Result<CommitInfo> {
        let raw = run_git_bytes(&["cat-file", "commit", commit], &self.repo_root)?;
        parse_commit(commit, &String::from_utf8_lossy(&raw))
    }

    fn create_ref_if_absent(&self, name: &str, commit: &str) -> Result<bool> {
        let mut attempt = 0;
        loop {
            // An empty old value makes update-ref refuse to overwrite an existing ref
            let output = run_git(&["update-ref", name, commit, ""], &self.repo_root)?;
            if output.status.success() {
                return Ok(true);
            }
            if self.resolve_ref(name)?.is_some() {
                return Ok(false);
            }
            // A concurrent writer may hold the ref lock without having written it yet
            attempt += 1;
            if attempt >= REF_LOCK_RETRIES {
                return Err(BtError::store(
                    "update-ref",
                    format!(
                        "could not create {name}: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                ));
            }
            debug!(ref_name = name, attempt, "ref locked, retrying");
            thread::sleep(REF_LOCK_DELAY);
        }
    }

    fn resolve_ref(&self, name: &str) -> Result<Option<String>> {
        let output = run_git(
            &["rev-parse", "--verify", "--quiet", &format!("{name}^{{commit}}")],
            &self.repo_root,
        )?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let pattern = prefix.trim_end_matches('/');
        let listing = self.git(&[
            "for-each-ref",
            "--format=%(objectname) %(refname)",
            pattern,
        ])?;
        Ok(listing
            .lines()
            .filter_map(|line| line.split_once(' '))
            .filter(|(_, name)| name.starts_with(prefix))
            .map(|(commit, name)| (name.to_string(), commit.to_string()))
            .collect())
    }

    fn revision_history(&self, count: usize) -> Result<Vec<String>> {
        let max = format!("--max-count={count}");
        let listing = self.git(&["rev-list", "--first-parent", &max, "HEAD"])?;
        Ok(listing.lines().map(str::to_string).collect())
    }
}
