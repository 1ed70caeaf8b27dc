//! Prompt compiler: source tree in, content-addressed manifest out.
//!
//! Documents are discovered in lexicographic path order, validated, merged
//! with their includes, and assembled into canonical manifest entries. Each
//! entry carries a SHA-256 hash of its canonical serialization, and the
//! whole manifest serializes with sorted keys and stable formatting so that
//! recompiling unchanged sources produces byte-identical output.

use manifold_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::include;
use crate::parser;
use crate::types::{
    Frontmatter, Manifest, PromptDefinition, PromptMessage, Role, MANIFEST_SCHEMA_VERSION,
};
use crate::validate;

/// Compile every prompt document under `src_root` into a manifest written
/// to `out_path`.
///
/// The first validation failure aborts the whole run; no partial manifest
/// is produced. The returned manifest is the same value that was written.
pub fn compile(src_root: &Path, out_path: &Path) -> AppResult<Manifest> {
    if !src_root.exists() {
        return Err(AppError::Compile(format!(
            "Source root not found: {}",
            src_root.display()
        )));
    }

    let prompt_files = collect_prompt_files(src_root);
    tracing::debug!("Discovered {} prompt documents", prompt_files.len());

    let mut prompts = Vec::with_capacity(prompt_files.len());
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for prompt_file in &prompt_files {
        let (frontmatter, mut sections) = load_prompt_document(prompt_file, src_root)?;
        include::merge_includes(src_root, &frontmatter.includes, &mut sections)?;
        validate::check_used_names(&frontmatter, &sections, prompt_file)?;
        validate::check_required_roles(&sections, prompt_file)?;

        register_identity(&mut seen, &frontmatter, prompt_file)?;

        prompts.push(build_prompt_entry(frontmatter, &sections)?);
    }

    let manifest = Manifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        prompts,
    };
    write_manifest(out_path, &manifest)?;

    tracing::info!(
        "Compiled {} prompts -> {}",
        manifest.prompts.len(),
        out_path.display()
    );
    Ok(manifest)
}

/// Collect prompt documents under the source root, skipping `_includes`,
/// in stable lexicographic order.
fn collect_prompt_files(src_root: &Path) -> Vec<PathBuf> {
    let mut prompt_files: Vec<PathBuf> = walkdir::WalkDir::new(src_root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "_includes")
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some("md")
        })
        .map(|entry| entry.into_path())
        .collect();
    prompt_files.sort();
    prompt_files
}

/// Guard the manifest-wide uniqueness of `(id, version)` pairs.
fn register_identity(
    seen: &mut HashSet<(String, String)>,
    frontmatter: &Frontmatter,
    path: &Path,
) -> AppResult<()> {
    let key = (frontmatter.id.clone(), frontmatter.version.clone());
    if !seen.insert(key) {
        return Err(AppError::Compile(format!(
            "Duplicate prompt id/version: {}@{} in {}",
            frontmatter.id,
            frontmatter.version,
            path.display()
        )));
    }
    Ok(())
}

/// Read, parse, and validate one non-include prompt document.
fn load_prompt_document(
    path: &Path,
    src_root: &Path,
) -> AppResult<(Frontmatter, BTreeMap<Role, String>)> {
    tracing::debug!("Loading prompt document: {}", path.display());

    let text = fs::read_to_string(path)?;
    let document = parser::parse_document(&text, path)?;
    let rel_path = path.strip_prefix(src_root).map_err(|_| {
        AppError::Compile(format!(
            "Prompt path outside source root: {}",
            path.display()
        ))
    })?;
    let frontmatter = validate::validate_document(&document.frontmatter, path, rel_path, false)?;
    Ok((frontmatter, document.sections))
}

/// Assemble a canonical manifest entry and stamp its content hash.
fn build_prompt_entry(
    frontmatter: Frontmatter,
    sections: &BTreeMap<Role, String>,
) -> AppResult<PromptDefinition> {
    let messages = build_messages(sections);

    let manifest_vars: BTreeSet<String> = frontmatter
        .variables
        .iter()
        .cloned()
        .chain(frontmatter.blocks.keys().cloned())
        .collect();
    let variables: Vec<String> = manifest_vars.into_iter().collect();

    let hash = hash_prompt_entry(&frontmatter, &variables, &messages)?;

    Ok(PromptDefinition {
        id: frontmatter.id,
        version: frontmatter.version,
        metadata: frontmatter.metadata,
        template_engine: frontmatter.template_engine,
        variables,
        blocks: frontmatter.blocks,
        messages,
        hash,
    })
}

/// Ordered message list: system, user, then assistant if present.
fn build_messages(sections: &BTreeMap<Role, String>) -> Vec<PromptMessage> {
    [Role::System, Role::User, Role::Assistant]
        .iter()
        .filter_map(|role| {
            sections.get(role).map(|content| PromptMessage {
                role: *role,
                content: content.clone(),
            })
        })
        .collect()
}

/// SHA-256 over the entry's canonical serialization, hash field excluded.
///
/// Canonical form is compact JSON with sorted keys; serde_json's default
/// object map keeps keys ordered.
fn hash_prompt_entry(
    frontmatter: &Frontmatter,
    variables: &[String],
    messages: &[PromptMessage],
) -> AppResult<String> {
    let entry = serde_json::json!({
        "id": frontmatter.id,
        "version": frontmatter.version,
        "metadata": frontmatter.metadata,
        "template_engine": frontmatter.template_engine,
        "variables": variables,
        "blocks": frontmatter.blocks,
        "messages": messages,
    });
    let canonical = serde_json::to_string(&entry)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialize the manifest deterministically: sorted keys, two-space
/// indentation, trailing newline.
fn serialize_manifest(manifest: &Manifest) -> AppResult<String> {
    let value = serde_json::to_value(manifest)?;
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    Ok(text)
}

/// Write the manifest artifact, but only when its content changed.
fn write_manifest(out_path: &Path, manifest: &Manifest) -> AppResult<()> {
    let serialized = serialize_manifest(manifest)?;

    if let Ok(existing) = fs::read_to_string(out_path) {
        if existing == serialized {
            tracing::debug!("Manifest unchanged, skipping write: {}", out_path.display());
            return Ok(());
        }
    }

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_path, serialized)?;
    Ok(())
}
