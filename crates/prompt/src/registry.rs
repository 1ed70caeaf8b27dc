//! Runtime prompt registry.
//!
//! Loads a compiled manifest into an immutable `(id, version)` map, resolves
//! a prompt by identifier and version (or latest), applies defaults and the
//! enrichment pipeline, and renders final message text through the
//! definition's template engine. Safe for unrestricted concurrent read-only
//! use once constructed.

use manifold_core::{AppError, AppResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::engine;
use crate::enrich::EnrichmentPipeline;
use crate::types::{Manifest, PromptDefinition, PromptMessage, RenderedPrompt};

/// Registry of compiled prompt definitions.
///
/// Each instance is independently constructed from a manifest and carries
/// its own configuration; there is no ambient global registry.
#[derive(Debug)]
pub struct PromptRegistry {
    prompts: HashMap<(String, String), PromptDefinition>,
    latest_versions: HashMap<String, String>,
    strict_inputs: bool,
    pipeline: Option<EnrichmentPipeline>,
}

impl PromptRegistry {
    /// Build a registry from an in-memory manifest.
    pub fn from_manifest(manifest: Manifest, strict_inputs: bool) -> Self {
        let mut prompts = HashMap::new();
        for prompt in manifest.prompts {
            prompts.insert((prompt.id.clone(), prompt.version.clone()), prompt);
        }
        let latest_versions = calculate_latest_versions(&prompts);
        Self {
            prompts,
            latest_versions,
            strict_inputs,
            pipeline: None,
        }
    }

    /// Load a registry from a manifest file.
    pub fn from_manifest_path(path: &Path, strict_inputs: bool) -> AppResult<Self> {
        tracing::debug!("Loading manifest: {}", path.display());
        let text = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&text).map_err(|e| {
            AppError::Serialization(format!(
                "Failed to parse manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::info!(
            "Loaded {} prompts from {}",
            manifest.prompts.len(),
            path.display()
        );
        Ok(Self::from_manifest(manifest, strict_inputs))
    }

    /// Attach an enrichment pipeline consulted before every render.
    pub fn set_enrichment_pipeline(&mut self, pipeline: EnrichmentPipeline) {
        self.pipeline = Some(pipeline);
    }

    /// Resolve a definition by id and version, or the latest version when
    /// no version is given. Latest is the lexicographically greatest
    /// registered version string.
    pub fn resolve(&self, id: &str, version: Option<&str>) -> AppResult<&PromptDefinition> {
        let resolved_version = match version {
            Some(v) => v,
            None => self
                .latest_versions
                .get(id)
                .map(String::as_str)
                .ok_or_else(|| AppError::NotFound(format!("Prompt id not found: {}", id)))?,
        };
        self.prompts
            .get(&(id.to_string(), resolved_version.to_string()))
            .ok_or_else(|| {
                AppError::NotFound(format!("Prompt not found: {}@{}", id, resolved_version))
            })
    }

    /// Render a prompt with the supplied variable and block values.
    ///
    /// A failed render aborts only this call; the registry stays usable.
    pub fn render(
        &self,
        id: &str,
        version: Option<&str>,
        vars: &HashMap<String, Value>,
        blocks: &HashMap<String, Value>,
    ) -> AppResult<RenderedPrompt> {
        let prompt = self.resolve(id, version)?;
        tracing::debug!("Rendering prompt {}@{}", prompt.id, prompt.version);

        let normalized_vars = normalize_values(vars);
        let normalized_blocks = normalize_values(blocks);

        if self.strict_inputs {
            validate_inputs(prompt, &normalized_vars, &normalized_blocks)?;
        }

        let blocks_with_defaults = apply_block_defaults(prompt, normalized_blocks)?;

        let enriched_blocks = match &self.pipeline {
            Some(pipeline) => {
                let enriched = pipeline.apply(prompt, &normalized_vars, blocks_with_defaults);
                if self.strict_inputs {
                    validate_enriched_blocks(prompt, &enriched)?;
                }
                enriched
            }
            None => blocks_with_defaults,
        };

        let mut values = normalized_vars;
        values.extend(enriched_blocks);

        let messages = prompt
            .messages
            .iter()
            .map(|message| {
                Ok(PromptMessage {
                    role: message.role,
                    content: engine::render(prompt.template_engine, &message.content, &values)?,
                })
            })
            .collect::<AppResult<Vec<PromptMessage>>>()?;

        Ok(RenderedPrompt { messages })
    }
}

/// Derive the lexicographically greatest version per identifier.
fn calculate_latest_versions(
    prompts: &HashMap<(String, String), PromptDefinition>,
) -> HashMap<String, String> {
    let mut latest: HashMap<String, String> = HashMap::new();
    for (id, version) in prompts.keys() {
        match latest.get(id) {
            Some(current) if version <= current => {}
            _ => {
                latest.insert(id.clone(), version.clone());
            }
        }
    }
    latest
}

/// Coerce every supplied value to a string.
///
/// Null becomes the empty string; strings pass through; anything else takes
/// its canonical JSON form. All later comparison and substitution operates
/// on strings only.
fn normalize_values(values: &HashMap<String, Value>) -> HashMap<String, String> {
    values
        .iter()
        .map(|(key, value)| {
            let normalized = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), normalized)
        })
        .collect()
}

/// Strict-input contract: supplied variables must exactly equal the
/// required set; supplied blocks must be a subset of declared blocks.
fn validate_inputs(
    prompt: &PromptDefinition,
    vars: &HashMap<String, String>,
    blocks: &HashMap<String, String>,
) -> AppResult<()> {
    let required = prompt.required_vars();
    let block_names = prompt.block_names();

    let mut missing: Vec<&String> = required
        .iter()
        .filter(|name| !vars.contains_key(*name))
        .collect();
    missing.sort();
    if !missing.is_empty() {
        return Err(AppError::Input(format!(
            "Missing required vars: {:?}",
            missing
        )));
    }

    let mut extra: Vec<&String> = vars
        .keys()
        .filter(|name| !required.contains(*name))
        .collect();
    extra.sort();
    if !extra.is_empty() {
        return Err(AppError::Input(format!("Extra vars provided: {:?}", extra)));
    }

    let mut extra_blocks: Vec<&String> = blocks
        .keys()
        .filter(|name| !block_names.contains(*name))
        .collect();
    extra_blocks.sort();
    if !extra_blocks.is_empty() {
        return Err(AppError::Input(format!(
            "Extra blocks provided: {:?}",
            extra_blocks
        )));
    }

    Ok(())
}

/// Fill in declared blocks the caller omitted.
///
/// Optional blocks take their default; a missing non-optional block is an
/// input error.
fn apply_block_defaults(
    prompt: &PromptDefinition,
    blocks: HashMap<String, String>,
) -> AppResult<HashMap<String, String>> {
    let mut merged = blocks;
    for (name, spec) in &prompt.blocks {
        if merged.contains_key(name) {
            continue;
        }
        if spec.optional {
            merged.insert(name.clone(), spec.default.clone().unwrap_or_default());
        } else {
            return Err(AppError::Input(format!("Missing required block: {}", name)));
        }
    }
    Ok(merged)
}

/// Enrichers may rewrite declared blocks but never widen the contract.
fn validate_enriched_blocks(
    prompt: &PromptDefinition,
    blocks: &HashMap<String, String>,
) -> AppResult<()> {
    let block_names = prompt.block_names();
    let mut extra: Vec<&String> = blocks
        .keys()
        .filter(|name| !block_names.contains(*name))
        .collect();
    extra.sort();
    if !extra.is_empty() {
        return Err(AppError::Input(format!(
            "Enrichers introduced undeclared blocks: {:?}",
            extra
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_doc(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn compile_sample(temp: &TempDir, optional: bool, default: &str) -> PathBuf {
        let src = temp.path().join("prompts");
        write_doc(
            &src,
            "planner/v1.md",
            &format!(
                r#"---
{{
  "id": "planner",
  "version": "v1",
  "metadata": {{}},
  "variables": ["question"],
  "blocks": {{
    "_context": {{"optional": {}, "default": "{}"}}
  }}
}}
---
# system
System.

# user
Q: {{{{question}}}}
Context: {{{{_context}}}}
"#,
                optional, default
            ),
        );
        let out = temp.path().join("dist/manifest.json");
        compile(&src, &out).unwrap();
        out
    }

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_and_defaults() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, false, "");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        let rendered = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[("question", Value::from("Hello"))]),
                &vars(&[("_context", Value::from("CTX"))]),
            )
            .unwrap();
        assert!(rendered.messages[1].content.starts_with("Q: Hello"));
        assert!(rendered.messages[1].content.contains("Context: CTX"));
    }

    #[test]
    fn test_normalizes_null_and_numbers() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, true, "default");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        let rendered = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[("question", Value::from(42))]),
                &vars(&[("_context", Value::Null)]),
            )
            .unwrap();
        assert!(rendered.messages[1].content.contains("Q: 42"));
        assert!(rendered.messages[1].content.contains("Context: \n") || rendered.messages[1].content.ends_with("Context: "));
    }

    #[test]
    fn test_optional_default_applied() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, true, "default");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        let rendered = registry
            .render(
                "planner",
                None,
                &vars(&[("question", Value::from("Hi"))]),
                &HashMap::new(),
            )
            .unwrap();
        assert!(rendered.messages[1].content.contains("Context: default"));
    }

    #[test]
    fn test_greeting_example() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("prompts");
        write_doc(
            &src,
            "greeting/v1.md",
            r#"---
{
  "id": "greeting",
  "version": "v1",
  "metadata": {},
  "variables": ["name"],
  "blocks": {
    "_context": {"optional": true, "default": ""}
  }
}
---
# system
Hello {{name}}. Context: {{_context}}.

# user
Hi {{name}}.
"#,
        );
        let out = temp.path().join("out.json");
        compile(&src, &out).unwrap();
        let registry = PromptRegistry::from_manifest_path(&out, true).unwrap();

        let rendered = registry
            .render(
                "greeting",
                None,
                &vars(&[("name", Value::from("Ada"))]),
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(rendered.messages[0].content, "Hello Ada. Context: .");
        assert_eq!(rendered.messages[1].content, "Hi Ada.");

        let rendered = registry
            .render(
                "greeting",
                None,
                &vars(&[("name", Value::from("Ada"))]),
                &vars(&[("_context", Value::from("Test"))]),
            )
            .unwrap();
        assert_eq!(rendered.messages[0].content, "Hello Ada. Context: Test.");
    }

    #[test]
    fn test_missing_prompt() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, true, "");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        let err = registry
            .render("unknown", None, &HashMap::new(), &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(err.to_string().contains("Prompt id not found: unknown"));
    }

    #[test]
    fn test_missing_version() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, true, "");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        let err = registry
            .render(
                "planner",
                Some("v2"),
                &vars(&[("question", Value::from("Hi"))]),
                &HashMap::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Prompt not found: planner@v2"));
    }

    #[test]
    fn test_strict_inputs() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, false, "");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        let err = registry
            .render(
                "planner",
                Some("v1"),
                &HashMap::new(),
                &vars(&[("_context", Value::from(""))]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Missing required vars"));

        let err = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[
                    ("question", Value::from("Hi")),
                    ("extra", Value::from("no")),
                ]),
                &vars(&[("_context", Value::from(""))]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Extra vars provided"));

        let err = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[("question", Value::from("Hi"))]),
                &vars(&[
                    ("_context", Value::from("")),
                    ("_extra", Value::from("bad")),
                ]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Extra blocks provided"));

        let err = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[("question", Value::from("Hi"))]),
                &HashMap::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Missing required block: _context"));
    }

    #[test]
    fn test_lenient_inputs_skip_contract() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, true, "");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, false).unwrap();

        // Extra vars pass through and unknown names render empty under the
        // literal engine.
        let rendered = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[
                    ("question", Value::from("Hi")),
                    ("extra", Value::from("ignored")),
                ]),
                &HashMap::new(),
            )
            .unwrap();
        assert!(rendered.messages[1].content.contains("Q: Hi"));
    }

    #[test]
    fn test_latest_version_resolution() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("prompts");
        for version in ["v1", "v2", "v3"] {
            write_doc(
                &src,
                &format!("planner/{}.md", version),
                &format!(
                    "---\n{{\"id\": \"planner\", \"version\": \"{}\", \"metadata\": {{}}, \"variables\": [\"question\"]}}\n---\n# system\nS.\n\n# user\nQ: {{{{question}}}}\n",
                    version
                ),
            );
        }
        let out = temp.path().join("out.json");
        compile(&src, &out).unwrap();
        let registry = PromptRegistry::from_manifest_path(&out, true).unwrap();

        let resolved = registry.resolve("planner", None).unwrap();
        assert_eq!(resolved.version, "v3");
    }

    #[test]
    fn test_enrichment_pipeline() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, false, "");
        let mut registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        registry.set_enrichment_pipeline(EnrichmentPipeline::new(vec![Box::new(
            |_, vars, _| {
                let mut updates = HashMap::new();
                let question = vars.get("question").cloned().unwrap_or_default();
                updates.insert("_context".to_string(), format!("enriched:{}", question));
                updates
            },
        )]));

        let rendered = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[("question", Value::from("Hi"))]),
                &vars(&[("_context", Value::from(""))]),
            )
            .unwrap();
        assert!(rendered.messages[1].content.contains("enriched:Hi"));
    }

    #[test]
    fn test_enricher_overreach_rejected() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, false, "");
        let mut registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        registry.set_enrichment_pipeline(EnrichmentPipeline::new(vec![Box::new(|_, _, _| {
            let mut updates = HashMap::new();
            updates.insert("_new_block".to_string(), "oops".to_string());
            updates
        })]));

        let err = registry
            .render(
                "planner",
                Some("v1"),
                &vars(&[("question", Value::from("Hi"))]),
                &vars(&[("_context", Value::from(""))]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Enrichers introduced undeclared blocks"));
    }

    #[test]
    fn test_sandbox_render_through_registry() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("prompts");
        write_doc(
            &src,
            "router/v1.md",
            r#"---
{
  "id": "router",
  "version": "v1",
  "template_engine": "sandbox",
  "metadata": {},
  "variables": ["question"],
  "blocks": {
    "_context": {"optional": true, "default": ""}
  }
}
---
# system
System.

# user
Question: {{ question }}
{% if _context %}Context: {{ _context }}{% endif %}
"#,
        );
        let out = temp.path().join("out.json");
        compile(&src, &out).unwrap();
        let registry = PromptRegistry::from_manifest_path(&out, true).unwrap();

        let rendered = registry
            .render(
                "router",
                Some("v1"),
                &vars(&[("question", Value::from("Hi"))]),
                &vars(&[("_context", Value::from("CTX"))]),
            )
            .unwrap();
        assert!(rendered.messages[1].content.contains("CTX"));
    }

    #[test]
    fn test_unknown_engine_rejected_at_load() {
        let temp = TempDir::new().unwrap();
        let manifest_path = temp.path().join("manifest.json");
        fs::write(
            &manifest_path,
            r#"{
  "schema_version": 1,
  "prompts": [
    {
      "id": "bad",
      "version": "v1",
      "metadata": {},
      "template_engine": "unknown",
      "variables": ["question"],
      "blocks": {},
      "messages": [
        {"role": "system", "content": "Hi"},
        {"role": "user", "content": "{{question}}"}
      ],
      "hash": "abc"
    }
  ]
}"#,
        )
        .unwrap();

        let err = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_render_failure_keeps_registry_usable() {
        let temp = TempDir::new().unwrap();
        let manifest_path = compile_sample(&temp, false, "");
        let registry = PromptRegistry::from_manifest_path(&manifest_path, true).unwrap();

        assert!(registry
            .render("planner", Some("v1"), &HashMap::new(), &HashMap::new())
            .is_err());

        let rendered = registry.render(
            "planner",
            Some("v1"),
            &vars(&[("question", Value::from("Hi"))]),
            &vars(&[("_context", Value::from("ok"))]),
        );
        assert!(rendered.is_ok());
    }
}
