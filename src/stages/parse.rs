//! Stage document parsing

use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Component, Path};

use super::{StageDefinition, DEFAULT_RUN};
use crate::error::{BtError, Result};
use crate::validation::validate_stage_name;

/// Shape of a stage file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageDocument {
    #[serde(default)]
    run: Option<String>,
    #[serde(default)]
    needs: Vec<String>,
    #[serde(default)]
    results: Vec<String>,
}

/// Sequence form of generator output, where each item carries its name
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedStageDocument {
    name: String,
    #[serde(default)]
    run: Option<String>,
    #[serde(default)]
    needs: Vec<String>,
    #[serde(default)]
    results: Vec<String>,
}

/// Stage name for a file under `stages/`: the file name without a YAML extension
pub fn stage_name_from_file(file_name: &str) -> &str {
    file_name
        .strip_suffix(".yaml")
        .or_else(|| file_name.strip_suffix(".yml"))
        .unwrap_or(file_name)
}

fn into_definition(name: &str, doc: StageDocument) -> Result<StageDefinition> {
    validate_stage_name(name)?;

    let mut needs: Vec<String> = Vec::with_capacity(doc.needs.len());
    for dep in doc.needs {
        if !needs.contains(&dep) {
            needs.push(dep);
        }
    }

    for result in &doc.results {
        validate_result_path(name, result)?;
    }

    Ok(StageDefinition {
        name: name.to_string(),
        run: doc.run.unwrap_or_else(|| DEFAULT_RUN.to_string()),
        needs,
        results: doc.results,
    })
}

/// Result paths must stay inside the working directory
fn validate_result_path(stage: &str, result: &str) -> Result<()> {
    if result.trim().is_empty() {
        return Err(BtError::malformed(stage, "empty result path"));
    }
    let escapes = Path::new(result)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(BtError::malformed(
            stage,
            format!("result path '{result}' must be relative and stay inside the tree"),
        ));
    }
    Ok(())
}

/// Parse the contents of a non-executable stage file.
///
/// An empty file is a stage with all defaults.
pub fn parse_stage_file(name: &str, content: &str) -> Result<StageDefinition> {
    if content.trim().is_empty() {
        return into_definition(name, StageDocument::default());
    }
    let doc: StageDocument =
        serde_yaml::from_str(content).map_err(|e| BtError::malformed(name, e.to_string()))?;
    into_definition(name, doc)
}

/// Parse a generator's standard output.
///
/// Accepts a mapping of `name -> definition` (document order is kept) or a
/// sequence of definitions that each carry a `name`. Empty output yields no
/// stages.
pub fn parse_generated(generator: &str, output: &str) -> Result<Vec<StageDefinition>> {
    let value: Value = serde_yaml::from_str(output).map_err(|e| {
        BtError::malformed(generator, format!("generator output is not YAML: {e}"))
    })?;

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Mapping(mapping) => mapping
            .into_iter()
            .map(|(key, body)| {
                let name = match key {
                    Value::String(name) => name,
                    other => {
                        return Err(BtError::malformed(
                            generator,
                            format!("stage name must be a string, got {other:?}"),
                        ))
                    }
                };
                let doc = match body {
                    Value::Null => StageDocument::default(),
                    other => serde_yaml::from_value(other)
                        .map_err(|e| BtError::malformed(&name, e.to_string()))?,
                };
                into_definition(&name, doc)
            })
            .collect(),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| {
                let named: NamedStageDocument = serde_yaml::from_value(item)
                    .map_err(|e| BtError::malformed(generator, e.to_string()))?;
                let doc = StageDocument {
                    run: named.run,
                    needs: named.needs,
                    results: named.results,
                };
                into_definition(&named.name, doc)
            })
            .collect(),
        _ => Err(BtError::malformed(
            generator,
            "generator output must be a mapping or a sequence of stages",
        )),
    }
}
