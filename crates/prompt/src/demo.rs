//! Demo runner: render a compiled manifest against a demo dataset.
//!
//! The dataset is a JSON list of `{id, version?, vars, blocks}` entries;
//! each entry is rendered through a strict registry and the results are
//! dumped as deterministic sorted-key JSON.

use manifold_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::registry::PromptRegistry;
use crate::types::PromptMessage;

/// One rendered demo entry.
#[derive(Debug, Clone, Serialize)]
pub struct DemoResult {
    pub id: String,
    pub version: String,
    pub vars: HashMap<String, Value>,
    pub blocks: HashMap<String, Value>,
    pub messages: Vec<PromptMessage>,
}

/// Render every entry of a demo dataset against a manifest.
pub fn render_demo(manifest_path: &Path, data_path: &Path) -> AppResult<Vec<DemoResult>> {
    let registry = PromptRegistry::from_manifest_path(manifest_path, true)?;
    let entries = load_demo_data(data_path)?;

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = require_str(&entry, "id")?;
        let version = match entry.get("version") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(AppError::Input(
                    "Demo entry 'version' must be a string when provided".to_string(),
                ));
            }
        };
        let vars = require_map(&entry, "vars")?;
        let blocks = require_map(&entry, "blocks")?;

        let resolved = registry.resolve(&id, version.as_deref())?;
        let resolved_version = resolved.version.clone();
        let rendered = registry.render(&id, version.as_deref(), &vars, &blocks)?;

        results.push(DemoResult {
            id,
            version: resolved_version,
            vars,
            blocks,
            messages: rendered.messages,
        });
    }
    Ok(results)
}

/// Serialize demo results as sorted-key, two-space-indented JSON.
pub fn dump_demo_results(results: &[DemoResult]) -> AppResult<String> {
    let value = serde_json::to_value(results)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Write demo results to a file, creating parent directories.
pub fn write_demo_results(results: &[DemoResult], output_path: &Path) -> AppResult<()> {
    let text = dump_demo_results(results)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, text)?;
    Ok(())
}

/// The dataset must be a JSON list of entry objects.
fn load_demo_data(data_path: &Path) -> AppResult<Vec<serde_json::Map<String, Value>>> {
    let text = fs::read_to_string(data_path)?;
    let data: Value = serde_json::from_str(&text)?;
    let entries = match data {
        Value::Array(items) => items,
        _ => {
            return Err(AppError::Input(
                "Demo data must be a list of prompt entries".to_string(),
            ));
        }
    };
    entries
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::Input(
                "Demo data must be a list of prompt entries".to_string(),
            )),
        })
        .collect()
}

fn require_str(entry: &serde_json::Map<String, Value>, key: &str) -> AppResult<String> {
    match entry.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(AppError::Input(format!(
            "Demo entry '{}' must be a string",
            key
        ))),
    }
}

fn require_map(
    entry: &serde_json::Map<String, Value>,
    key: &str,
) -> AppResult<HashMap<String, Value>> {
    match entry.get(key) {
        None | Some(Value::Null) => Ok(HashMap::new()),
        Some(Value::Object(map)) => Ok(map.clone().into_iter().collect()),
        Some(_) => Err(AppError::Input(format!(
            "Demo entry '{}' must be a mapping when provided",
            key
        ))),
    }
}
