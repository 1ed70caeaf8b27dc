//! Structural and naming validation for template documents.
//!
//! Checks run in a fixed order and fail fast on the first violation:
//! required frontmatter fields, name patterns, path identity, declared-set
//! disjointness, engine selection — then, after include merging, the
//! declare/use symmetry contract and required-role presence.

use manifold_core::{AppError, AppResult};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use crate::engine;
use crate::types::{BlockSpec, Frontmatter, Role, TemplateEngine};

static VARIABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("variable pattern must compile"));

static BLOCK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_[a-z][a-z0-9_]*$").expect("block pattern must compile"));

/// Validate a parsed document's frontmatter and its storage location.
///
/// `rel_path` is the document path relative to the source root; include
/// documents live under `_includes/<name>/<version>.md`, prompts under
/// `<id>/<version>.md`.
pub fn validate_document(
    raw: &serde_json::Map<String, Value>,
    path: &Path,
    rel_path: &Path,
    is_include: bool,
) -> AppResult<Frontmatter> {
    let (id, version, metadata) = check_required_fields(raw, path)?;
    let variables = check_variable_names(raw, path)?;
    let blocks = check_block_specs(raw, path)?;
    let includes = check_includes(raw, path)?;
    check_path_identity(&id, &version, rel_path, is_include, path)?;
    check_disjoint(&variables, &blocks, path)?;
    let template_engine = check_template_engine(raw, path)?;

    Ok(Frontmatter {
        id,
        version,
        metadata,
        variables,
        blocks,
        includes,
        template_engine,
    })
}

/// Required fields: non-empty id and version strings, metadata object,
/// variables list.
fn check_required_fields(
    raw: &serde_json::Map<String, Value>,
    path: &Path,
) -> AppResult<(String, String, BTreeMap<String, Value>)> {
    for field in ["id", "version", "metadata", "variables"] {
        if !raw.contains_key(field) {
            return Err(AppError::Compile(format!(
                "Missing frontmatter field '{}' in {}",
                field,
                path.display()
            )));
        }
    }

    let id = match raw.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(AppError::Compile(format!("Invalid id in {}", path.display())));
        }
    };
    let version = match raw.get("version") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(AppError::Compile(format!(
                "Invalid version in {}",
                path.display()
            )));
        }
    };
    let metadata = match raw.get("metadata") {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        _ => {
            return Err(AppError::Compile(format!(
                "Invalid metadata in {}",
                path.display()
            )));
        }
    };
    if !matches!(raw.get("variables"), Some(Value::Array(_))) {
        return Err(AppError::Compile(format!(
            "Invalid variables in {}",
            path.display()
        )));
    }

    Ok((id, version, metadata))
}

/// Every declared variable name must match the lowercase-snake pattern.
fn check_variable_names(
    raw: &serde_json::Map<String, Value>,
    path: &Path,
) -> AppResult<Vec<String>> {
    let items = match raw.get("variables") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(AppError::Compile(format!(
                "Invalid variables in {}",
                path.display()
            )));
        }
    };

    let mut variables = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(name) if VARIABLE_NAME.is_match(name) => {
                variables.push(name.clone());
            }
            other => {
                return Err(AppError::Compile(format!(
                    "Invalid variable name '{}' in {}",
                    display_name(other),
                    path.display()
                )));
            }
        }
    }
    Ok(variables)
}

/// Block names carry the `_` marker prefix; specs are `{optional, default}`.
fn check_block_specs(
    raw: &serde_json::Map<String, Value>,
    path: &Path,
) -> AppResult<BTreeMap<String, BlockSpec>> {
    let entries = match raw.get("blocks") {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(AppError::Compile(format!(
                "Invalid blocks in {}",
                path.display()
            )));
        }
    };

    let mut blocks = BTreeMap::new();
    for (name, spec) in entries {
        if !BLOCK_NAME.is_match(name) {
            return Err(AppError::Compile(format!(
                "Invalid block name '{}' in {}",
                name,
                path.display()
            )));
        }
        let spec = match spec {
            Value::Object(map) => map,
            _ => {
                return Err(AppError::Compile(format!(
                    "Invalid block spec for '{}' in {}",
                    name,
                    path.display()
                )));
            }
        };
        let optional = match spec.get("optional") {
            None => true,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                return Err(AppError::Compile(format!(
                    "Invalid optional flag for '{}' in {}",
                    name,
                    path.display()
                )));
            }
        };
        let default = match spec.get("default") {
            None => Some(String::new()),
            Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(AppError::Compile(format!(
                    "Invalid default for '{}' in {}",
                    name,
                    path.display()
                )));
            }
        };
        blocks.insert(name.clone(), BlockSpec { optional, default });
    }
    Ok(blocks)
}

/// The optional includes list must be a list of reference strings.
fn check_includes(raw: &serde_json::Map<String, Value>, path: &Path) -> AppResult<Vec<String>> {
    let items = match raw.get("includes") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AppError::Compile(format!(
                "Invalid includes in {}",
                path.display()
            )));
        }
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(AppError::Compile(format!(
                "Invalid include reference '{}' in {}",
                display_name(other),
                path.display()
            ))),
        })
        .collect()
}

/// A document's storage path must match its declared identity exactly.
fn check_path_identity(
    id: &str,
    version: &str,
    rel_path: &Path,
    is_include: bool,
    path: &Path,
) -> AppResult<()> {
    let parts: Vec<String> = rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if is_include {
        if parts.len() != 3 || parts[0] != "_includes" {
            return Err(AppError::Compile(format!(
                "Invalid include path: {}",
                rel_path.display()
            )));
        }
        let file_version = parts[2].strip_suffix(".md").unwrap_or(&parts[2]);
        if parts[1] != id || file_version != version {
            return Err(AppError::Compile(format!(
                "Include id/version mismatch in {}",
                path.display()
            )));
        }
        return Ok(());
    }

    if parts.len() != 2 {
        return Err(AppError::Compile(format!(
            "Invalid prompt path (expected <id>/<version>.md): {}",
            rel_path.display()
        )));
    }
    let file_version = parts[1].strip_suffix(".md").unwrap_or(&parts[1]);
    if parts[0] != id || file_version != version {
        return Err(AppError::Compile(format!(
            "Prompt id/version mismatch in {}",
            path.display()
        )));
    }
    Ok(())
}

/// Declared variable names and declared block names must be disjoint.
fn check_disjoint(
    variables: &[String],
    blocks: &BTreeMap<String, BlockSpec>,
    path: &Path,
) -> AppResult<()> {
    let overlap: Vec<&String> = variables.iter().filter(|v| blocks.contains_key(*v)).collect();
    if !overlap.is_empty() {
        return Err(AppError::Compile(format!(
            "Variables and blocks overlap in {}: {:?}",
            path.display(),
            overlap
        )));
    }
    Ok(())
}

/// The chosen engine must be one of the two recognized engines.
fn check_template_engine(
    raw: &serde_json::Map<String, Value>,
    path: &Path,
) -> AppResult<TemplateEngine> {
    match raw.get("template_engine") {
        None => Ok(TemplateEngine::default()),
        Some(Value::String(s)) => TemplateEngine::parse(s).ok_or_else(|| {
            AppError::Compile(format!(
                "Invalid template_engine '{}' in {}",
                s,
                path.display()
            ))
        }),
        Some(other) => Err(AppError::Compile(format!(
            "Invalid template_engine '{}' in {}",
            display_name(other),
            path.display()
        ))),
    }
}

/// The declare/use symmetry contract, applied after include merging.
///
/// The set of names referenced inside the merged role text must equal the
/// declared name set exactly; referenced names carrying the block marker
/// must be declared blocks.
pub fn check_used_names(
    frontmatter: &Frontmatter,
    sections: &BTreeMap<Role, String>,
    path: &Path,
) -> AppResult<()> {
    let merged_text = sections
        .values()
        .cloned()
        .collect::<Vec<String>>()
        .join("\n");
    let used = engine::extract_used_names(frontmatter.template_engine, &merged_text, path)?;

    let declared: BTreeSet<String> = frontmatter
        .variables
        .iter()
        .cloned()
        .chain(frontmatter.blocks.keys().cloned())
        .collect();

    let undeclared: Vec<&String> = used.difference(&declared).collect();
    if !undeclared.is_empty() {
        return Err(AppError::Compile(format!(
            "Undeclared names in {}: {:?}",
            path.display(),
            undeclared
        )));
    }

    let unused: Vec<&String> = declared.difference(&used).collect();
    if !unused.is_empty() {
        return Err(AppError::Compile(format!(
            "Declared but unused names in {}: {:?}",
            path.display(),
            unused
        )));
    }

    let invalid_block_refs: Vec<&String> = used
        .iter()
        .filter(|name| name.starts_with('_') && !frontmatter.blocks.contains_key(*name))
        .collect();
    if !invalid_block_refs.is_empty() {
        return Err(AppError::Compile(format!(
            "Underscore names must be blocks in {}: {:?}",
            path.display(),
            invalid_block_refs
        )));
    }

    Ok(())
}

/// Both `system` and `user` must be present after merging.
pub fn check_required_roles(sections: &BTreeMap<Role, String>, path: &Path) -> AppResult<()> {
    let missing: Vec<&str> = [Role::System, Role::User]
        .iter()
        .filter(|role| !sections.contains_key(role))
        .map(|role| role.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Compile(format!(
            "Missing required roles {:?} in {}",
            missing,
            path.display()
        )));
    }
    Ok(())
}

fn display_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn raw(json: &str) -> serde_json::Map<String, Value> {
        match serde_json::from_str(json).unwrap() {
            Value::Object(map) => map,
            _ => panic!("test frontmatter must be an object"),
        }
    }

    fn validate(json: &str) -> AppResult<Frontmatter> {
        validate_document(
            &raw(json),
            &PathBuf::from("planner/v1.md"),
            &PathBuf::from("planner/v1.md"),
            false,
        )
    }

    #[test]
    fn test_valid_frontmatter() {
        let fm = validate(
            r#"{"id": "planner", "version": "v1", "metadata": {"team": "core"},
                "variables": ["question"],
                "blocks": {"_context": {"optional": true, "default": ""}}}"#,
        )
        .unwrap();
        assert_eq!(fm.id, "planner");
        assert_eq!(fm.variables, vec!["question"]);
        assert!(fm.blocks.contains_key("_context"));
        assert_eq!(fm.template_engine, TemplateEngine::Literal);
    }

    #[test]
    fn test_missing_field() {
        let err = validate(r#"{"id": "planner", "version": "v1", "metadata": {}}"#).unwrap_err();
        assert!(err.to_string().contains("Missing frontmatter field 'variables'"));
    }

    #[test]
    fn test_empty_id_rejected() {
        let err =
            validate(r#"{"id": "", "version": "v1", "metadata": {}, "variables": []}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid id"));
    }

    #[test]
    fn test_invalid_variable_name() {
        let err = validate(
            r#"{"id": "planner", "version": "v1", "metadata": {}, "variables": ["BadName"]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid variable name 'BadName'"));
    }

    #[test]
    fn test_block_name_requires_marker() {
        let err = validate(
            r#"{"id": "planner", "version": "v1", "metadata": {}, "variables": [],
                "blocks": {"context": {}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid block name 'context'"));
    }

    #[test]
    fn test_null_default_preserved() {
        let fm = validate(
            r#"{"id": "planner", "version": "v1", "metadata": {}, "variables": [],
                "blocks": {"_context": {"default": null}}}"#,
        )
        .unwrap();
        assert_eq!(fm.blocks["_context"].default, None);
        assert!(fm.blocks["_context"].optional);
    }

    #[test]
    fn test_path_identity_mismatch() {
        let err = validate_document(
            &raw(r#"{"id": "other", "version": "v1", "metadata": {}, "variables": []}"#),
            &PathBuf::from("planner/v1.md"),
            &PathBuf::from("planner/v1.md"),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("id/version mismatch"));
    }

    #[test]
    fn test_invalid_prompt_path_shape() {
        let err = validate_document(
            &raw(r#"{"id": "planner", "version": "v1", "metadata": {}, "variables": []}"#),
            &PathBuf::from("deep/planner/v1.md"),
            &PathBuf::from("deep/planner/v1.md"),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid prompt path"));
    }

    #[test]
    fn test_include_path_identity() {
        let ok = validate_document(
            &raw(r#"{"id": "policy", "version": "v2", "metadata": {}, "variables": []}"#),
            &PathBuf::from("_includes/policy/v2.md"),
            &PathBuf::from("_includes/policy/v2.md"),
            true,
        );
        assert!(ok.is_ok());

        let err = validate_document(
            &raw(r#"{"id": "policy", "version": "v1", "metadata": {}, "variables": []}"#),
            &PathBuf::from("_includes/policy/v2.md"),
            &PathBuf::from("_includes/policy/v2.md"),
            true,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Include id/version mismatch"));
    }

    #[test]
    fn test_overlap_rejected() {
        // Overlap is impossible with well-formed names (the marker prefix
        // separates the namespaces), so force it through the raw shape.
        let err = validate(
            r#"{"id": "planner", "version": "v1", "metadata": {},
                "variables": ["_context"],
                "blocks": {"_context": {}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid variable name"));
    }

    #[test]
    fn test_disjoint_guard() {
        let mut blocks = BTreeMap::new();
        blocks.insert(
            "_context".to_string(),
            BlockSpec {
                optional: true,
                default: Some(String::new()),
            },
        );
        let err = check_disjoint(
            &["_context".to_string()],
            &blocks,
            &PathBuf::from("planner/v1.md"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Variables and blocks overlap"));
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let err = validate(
            r#"{"id": "planner", "version": "v1", "metadata": {}, "variables": [],
                "template_engine": "mustache"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid template_engine 'mustache'"));
    }

    #[test]
    fn test_usage_symmetry() {
        let fm = validate(
            r#"{"id": "planner", "version": "v1", "metadata": {},
                "variables": ["question"],
                "blocks": {"_context": {}}}"#,
        )
        .unwrap();
        let path = PathBuf::from("planner/v1.md");

        let mut sections = BTreeMap::new();
        sections.insert(Role::System, "Use {{_context}}.".to_string());
        sections.insert(Role::User, "Q: {{question}}".to_string());
        assert!(check_used_names(&fm, &sections, &path).is_ok());

        sections.insert(Role::User, "Q: {{question}} {{missing}}".to_string());
        let err = check_used_names(&fm, &sections, &path).unwrap_err();
        assert!(err.to_string().contains("Undeclared names"));

        sections.insert(Role::User, "Q: {{question}}".to_string());
        sections.insert(Role::System, "No block here.".to_string());
        let err = check_used_names(&fm, &sections, &path).unwrap_err();
        assert!(err.to_string().contains("Declared but unused names"));
    }

    #[test]
    fn test_required_roles() {
        let path = PathBuf::from("planner/v1.md");
        let mut sections = BTreeMap::new();
        sections.insert(Role::System, "Hi".to_string());
        let err = check_required_roles(&sections, &path).unwrap_err();
        assert!(err.to_string().contains("Missing required roles"));
        assert!(err.to_string().contains("user"));

        sections.insert(Role::User, "Go".to_string());
        assert!(check_required_roles(&sections, &path).is_ok());
    }
}
