//! Document parser: frontmatter block plus role-keyed body sections.
//!
//! A template document is a `---` delimiter line, a strict-JSON header
//! block, a closing `---` line, then a body of single-level role headings
//! (`# system`, `# user`, `# assistant`) each followed by free text.

use manifold_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{Role, TemplateDocument};

/// Parse the raw text of one template document.
///
/// The path is only used for diagnostics; path-identity validation happens
/// in the validator.
pub fn parse_document(text: &str, path: &Path) -> AppResult<TemplateDocument> {
    let (frontmatter, body) = parse_frontmatter(text, path)?;
    let sections = parse_sections(&body, path)?;
    Ok(TemplateDocument {
        frontmatter,
        sections,
    })
}

/// Split off and parse the JSON header block.
fn parse_frontmatter(
    text: &str,
    path: &Path,
) -> AppResult<(serde_json::Map<String, serde_json::Value>, String)> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.first().map(|line| line.trim()) != Some("---") {
        return Err(AppError::Compile(format!(
            "Missing frontmatter delimiter in {}",
            path.display()
        )));
    }

    let end = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.trim() == "---")
        .map(|(index, _)| index)
        .ok_or_else(|| {
            AppError::Compile(format!(
                "Missing closing frontmatter delimiter in {}",
                path.display()
            ))
        })?;

    let json_block = lines[1..end].join("\n");
    let json_block = json_block.trim();
    if json_block.is_empty() {
        return Err(AppError::Compile(format!(
            "Empty frontmatter in {}",
            path.display()
        )));
    }

    let value: serde_json::Value = serde_json::from_str(json_block).map_err(|e| {
        AppError::Compile(format!("Invalid JSON frontmatter in {}: {}", path.display(), e))
    })?;
    let frontmatter = match value {
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(AppError::Compile(format!(
                "Frontmatter must be a JSON object in {}",
                path.display()
            )))
        }
    };

    let body = lines[end + 1..].join("\n");
    let body = body.trim_start_matches('\n').to_string();
    Ok((frontmatter, body))
}

/// Split the body into role sections.
///
/// Only single-level headings naming a known role are allowed; non-blank
/// content before the first heading is an error. Section text is trimmed of
/// leading and trailing blank lines.
fn parse_sections(body: &str, path: &Path) -> AppResult<BTreeMap<Role, String>> {
    let mut sections: BTreeMap<Role, Vec<&str>> = BTreeMap::new();
    let mut current: Option<Role> = None;

    for line in body.lines() {
        if let Some(heading) = line.strip_prefix("# ") {
            let role = Role::parse(heading.trim()).ok_or_else(|| {
                AppError::Compile(format!(
                    "Invalid role heading '{}' in {}",
                    line,
                    path.display()
                ))
            })?;
            current = Some(role);
            sections.entry(role).or_default();
            continue;
        }
        if line.starts_with('#') {
            return Err(AppError::Compile(format!(
                "Invalid heading '{}' in {}; only single-level role headings allowed",
                line,
                path.display()
            )));
        }
        match current {
            Some(role) => {
                // Entry exists from the heading that set `current`.
                if let Some(section) = sections.get_mut(&role) {
                    section.push(line);
                }
            }
            None => {
                if !line.trim().is_empty() {
                    return Err(AppError::Compile(format!(
                        "Content before first role heading in {}",
                        path.display()
                    )));
                }
            }
        }
    }

    Ok(sections
        .into_iter()
        .map(|(role, lines)| (role, lines.join("\n").trim().to_string()))
        .collect())
}
