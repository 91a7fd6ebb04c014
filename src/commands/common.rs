//! Helpers shared by the commands

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::git::GitObjectStore;
use crate::store::ObjectStore;

/// Open the git repository at `dir` along with its `bt.toml`
pub(super) fn open(dir: &Path) -> Result<(Arc<GitObjectStore>, Config)> {
    let store = GitObjectStore::open(dir)
        .with_context(|| format!("Failed to open repository at {}", dir.display()))?;
    let config = Config::load(dir)?;
    Ok((Arc::new(store), config))
}

/// Full commit id for `revision`, or the current revision when absent
pub(super) fn resolve_revision(store: &GitObjectStore, revision: Option<&str>) -> Result<String> {
    match revision {
        Some(rev) => store
            .resolve_ref(rev)?
            .with_context(|| format!("Unknown revision '{rev}'")),
        None => store
            .current_revision()
            .context("Failed to read current revision"),
    }
}
