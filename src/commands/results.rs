//! `bt results`: one JSON object per revision
//!
//! ```text
//! {"<revision>":{"<stage>":{"status":"PASS","commit":"..","result_tree":"..","output":".."},"<unbuilt>":{}}}
//! ```

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::warn;

use super::common::{open, resolve_revision};
use crate::stages::StageLoader;
use crate::store::{BuildRecord, ObjectStore, ResultStore};

fn record_json(record: &BuildRecord) -> Value {
    json!({
        "status": record.status,
        "commit": record.commit,
        "result_tree": record.result_tree,
        "output": record.command_output,
    })
}

pub fn execute(dir: &Path, revision: Option<&str>, count: usize) -> Result<()> {
    let (store, config) = open(dir)?;

    let revisions = match revision {
        Some(rev) => vec![resolve_revision(&store, Some(rev))?],
        None => store
            .revision_history(count)
            .context("Failed to list revisions")?,
    };

    let loader = StageLoader::new(store.clone()).with_stages_dir(config.stages_dir.clone());
    let results = ResultStore::new(store);

    for rev in revisions {
        let mut records = results.list_records(&rev)?;
        let mut stages = Map::new();

        // Unbuilt stages show as {}; a revision whose stages no longer load
        // still reports the records it has
        match loader.load(&rev) {
            Ok(graph) => {
                for name in graph.stages().names() {
                    let value = records
                        .remove(name)
                        .map(|r| record_json(&r))
                        .unwrap_or_else(|| json!({}));
                    stages.insert(name.to_string(), value);
                }
            }
            Err(e) => warn!(revision = %rev, error = %e, "could not load stages"),
        }
        for (name, record) in records {
            stages.insert(name, record_json(&record));
        }

        let mut line = Map::new();
        line.insert(rev, Value::Object(stages));
        println!("{}", Value::Object(line));
    }
    Ok(())
}
