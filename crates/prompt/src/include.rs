//! Include resolver: shared documents merged into a prompt's role sections.
//!
//! An include reference has the form `<name>@<version>` and resolves to
//! `_includes/<name>/<version>.md` under the source root. Includes merge
//! before name-usage validation, so included names participate in the same
//! declare/use contract as the including document's own names.

use manifold_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::parser;
use crate::types::Role;
use crate::validate;

/// Merge every referenced include into the given sections, in order.
///
/// Per role: include content is placed before any existing content with one
/// blank line of separation; a role the prompt lacks adopts the include
/// content verbatim. Either way the result is trimmed.
pub fn merge_includes(
    src_root: &Path,
    includes: &[String],
    sections: &mut BTreeMap<Role, String>,
) -> AppResult<()> {
    for reference in includes {
        let include_sections = load_include(src_root, reference)?;
        for (role, content) in include_sections {
            let merged = match sections.get(&role) {
                Some(existing) if !existing.is_empty() => {
                    format!("{}\n\n{}", content, existing).trim().to_string()
                }
                _ => content.trim().to_string(),
            };
            sections.insert(role, merged);
        }
    }
    Ok(())
}

/// Load and validate one include document, returning its sections.
fn load_include(src_root: &Path, reference: &str) -> AppResult<BTreeMap<Role, String>> {
    let (name, version) = reference.split_once('@').ok_or_else(|| {
        AppError::Compile(format!("Invalid include reference: {}", reference))
    })?;

    let include_path = src_root
        .join("_includes")
        .join(name)
        .join(format!("{}.md", version));
    if !include_path.exists() {
        return Err(AppError::Compile(format!(
            "Missing include file: {}",
            include_path.display()
        )));
    }

    tracing::debug!("Loading include: {}", include_path.display());

    let text = fs::read_to_string(&include_path)?;
    let document = parser::parse_document(&text, &include_path)?;
    let rel_path = include_path.strip_prefix(src_root).map_err(|_| {
        AppError::Compile(format!(
            "Include path outside source root: {}",
            include_path.display()
        ))
    })?;
    validate::validate_document(&document.frontmatter, &include_path, rel_path, true)?;

    Ok(document.sections)
}
