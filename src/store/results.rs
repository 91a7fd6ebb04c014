//! Build records: write-once stage outcomes keyed by (revision, stage)
//!
//! A record is a commit whose tree holds the captured command output
//! (`output`) and the stage's result files (`results/`). Its first parent is
//! the revision that was built, followed by the records of the stage's
//! dependencies. The ref `refs/bt/<revision>/<stage>` points at it.
//!
//! `put` is compare-and-create: the ref is only ever created, never moved, so
//! concurrent orchestrators end up with exactly one record per key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{ObjectStore, TreeFile};
use crate::error::{BtError, Result};
use crate::validation::validate_stage_name;

/// Namespace for all build record refs
pub const REF_PREFIX: &str = "refs/bt";

pub const PASS_MESSAGE: &str = "PASS bt loves you";
pub const FAIL_MESSAGE: &str = "FAIL bt loves you";

const OUTPUT_PATH: &str = "output";
const RESULTS_DIR: &str = "results";

/// Outcome of one stage run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Status::Pass => PASS_MESSAGE,
            Status::Fail => FAIL_MESSAGE,
        }
    }

    pub fn from_message(message: &str) -> Option<Self> {
        match message.trim_end() {
            PASS_MESSAGE => Some(Status::Pass),
            FAIL_MESSAGE => Some(Status::Fail),
            _ => None,
        }
    }

    pub fn is_pass(self) -> bool {
        self == Status::Pass
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

/// Persisted outcome of running one stage against one revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRecord {
    pub revision: String,
    pub stage: String,
    pub status: Status,
    /// Commit object holding this record
    pub commit: String,
    /// Tree of result files; `None` when the stage produced nothing
    pub result_tree: Option<String>,
    /// Output blob decoded for display; invalid UTF-8 is replaced
    pub command_output: String,
    /// Revision commit first, then dependency record commits in `needs` order
    pub parents: Vec<String>,
}

/// Access to build records stored in an object store
#[derive(Clone)]
pub struct ResultStore {
    store: Arc<dyn ObjectStore>,
}

impl ResultStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn ref_name(revision: &str, stage: &str) -> String {
        format!("{REF_PREFIX}/{revision}/{stage}")
    }

    /// Inverse of `ref_name`
    pub fn parse_ref_name(name: &str) -> Option<(String, String)> {
        let rest = name.strip_prefix(REF_PREFIX)?.strip_prefix('/')?;
        let (revision, stage) = rest.split_once('/')?;
        if revision.is_empty() || stage.is_empty() || stage.contains('/') {
            return None;
        }
        Some((revision.to_string(), stage.to_string()))
    }

    pub fn get(&self, revision: &str, stage: &str) -> Result<Option<BuildRecord>> {
        match self.store.resolve_ref(&Self::ref_name(revision, stage))? {
            Some(commit) => self.load_record(revision, stage, &commit).map(Some),
            None => Ok(None),
        }
    }

    fn load_record(&self, revision: &str, stage: &str, commit: &str) -> Result<BuildRecord> {
        let info = self.store.read_commit(commit)?;
        let status = Status::from_message(&info.message).ok_or_else(|| {
            BtError::store(
                "read record",
                format!("{commit} is not a build record (message {:?})", info.message),
            )
        })?;
        let output = self
            .store
            .read_blob(commit, OUTPUT_PATH)?
            .unwrap_or_default();
        let result_tree = self.store.resolve_path(commit, RESULTS_DIR)?;

        Ok(BuildRecord {
            revision: revision.to_string(),
            stage: stage.to_string(),
            status,
            commit: commit.to_string(),
            result_tree,
            command_output: String::from_utf8_lossy(&output).into_owned(),
            parents: info.parents,
        })
    }

    /// Record the outcome of a stage run.
    ///
    /// Fails with `AlreadyRecorded` if a record exists for the key, whether it
    /// was there before the call or another writer won the race.
    pub fn put(
        &self,
        revision: &str,
        stage: &str,
        status: Status,
        output_files: &[TreeFile],
        command_output: &[u8],
        parent_records: &[BuildRecord],
    ) -> Result<BuildRecord> {
        validate_stage_name(stage)?;
        let ref_name = Self::ref_name(revision, stage);
        let already_recorded = || BtError::AlreadyRecorded {
            revision: revision.to_string(),
            stage: stage.to_string(),
        };

        if self.store.resolve_ref(&ref_name)?.is_some() {
            return Err(already_recorded());
        }

        // No partial artifacts for failed runs
        let results: &[TreeFile] = if status.is_pass() { output_files } else { &[] };

        let result_tree = if results.is_empty() {
            None
        } else {
            Some(self.store.create_tree(results)?)
        };

        let mut record_files = Vec::with_capacity(results.len() + 1);
        record_files.push(TreeFile::new(OUTPUT_PATH, command_output));
        record_files.extend(results.iter().map(|f| TreeFile {
            path: format!("{RESULTS_DIR}/{}", f.path),
            ..f.clone()
        }));
        let tree = self.store.create_tree(&record_files)?;

        let mut parents = vec![revision.to_string()];
        parents.extend(parent_records.iter().map(|r| r.commit.clone()));
        let commit = self.store.create_commit(&tree, status.message(), &parents)?;

        if !self.store.create_ref_if_absent(&ref_name, &commit)? {
            debug!(revision, stage, "lost race recording result");
            return Err(already_recorded());
        }

        info!(revision, stage, %status, commit = %commit, "recorded result");
        Ok(BuildRecord {
            revision: revision.to_string(),
            stage: stage.to_string(),
            status,
            commit,
            result_tree,
            command_output: String::from_utf8_lossy(command_output).into_owned(),
            parents,
        })
    }

    /// All records for a revision, by stage name
    pub fn list_records(&self, revision: &str) -> Result<BTreeMap<String, BuildRecord>> {
        let prefix = format!("{REF_PREFIX}/{revision}/");
        let mut records = BTreeMap::new();
        for (name, commit) in self.store.list_refs(&prefix)? {
            let Some((rev, stage)) = Self::parse_ref_name(&name) else {
                debug!(ref_name = %name, "ignoring foreign ref");
                continue;
            };
            if rev != revision {
                continue;
            }
            let record = self.load_record(&rev, &stage, &commit)?;
            records.insert(stage, record);
        }
        Ok(records)
    }

    /// Files of the record's result tree, paths relative to the tree root
    pub fn result_files(&self, record: &BuildRecord) -> Result<Vec<TreeFile>> {
        if record.result_tree.is_none() {
            return Ok(Vec::new());
        }
        self.store.read_tree(&record.commit, RESULTS_DIR)
    }

    /// Poll until a record for the key is visible or `timeout` elapses.
    pub fn wait_for_record(
        &self,
        revision: &str,
        stage: &str,
        timeout: Duration,
        poll: Duration,
    ) -> Result<Option<BuildRecord>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(record) = self.get(revision, stage)? {
                return Ok(Some(record));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(poll.min(deadline - now));
        }
    }
}
