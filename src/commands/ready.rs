//! `bt ready`: print the stages that can run now, one per line

use anyhow::{Context, Result};
use std::path::Path;

use super::common::{open, resolve_revision};
use crate::readiness::ready_stages;
use crate::stages::StageLoader;
use crate::store::ResultStore;

pub fn execute(dir: &Path, revision: Option<&str>) -> Result<()> {
    let (store, config) = open(dir)?;
    let revision = resolve_revision(&store, revision)?;

    let graph = StageLoader::new(store.clone())
        .with_stages_dir(config.stages_dir.clone())
        .load(&revision)
        .with_context(|| format!("Failed to load stages at {revision}"))?;
    let results = ResultStore::new(store);

    for stage in ready_stages(&results, &revision, &graph)? {
        println!("{stage}");
    }
    Ok(())
}
