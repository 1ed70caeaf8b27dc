//! Template engines.
//!
//! Two interchangeable renderers sit behind the closed [`TemplateEngine`]
//! dispatch: the literal engine substitutes `{{name}}` tokens and nothing
//! else; the sandbox engine evaluates a restricted expression language.
//! Both satisfy the same `render(template, values) -> String` contract, and
//! each knows how to statically extract the names a template references so
//! the validator can enforce the declare/use contract.

pub mod literal;
pub mod sandbox;

use manifold_core::AppResult;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::types::TemplateEngine;

/// Render a message template with the merged value mapping.
pub fn render(
    engine: TemplateEngine,
    template: &str,
    values: &HashMap<String, String>,
) -> AppResult<String> {
    match engine {
        TemplateEngine::Literal => Ok(literal::render(template, values)),
        TemplateEngine::Sandbox => sandbox::render(template, values),
    }
}

/// Extract the set of names a template references.
///
/// The literal engine reports the same tokens it would later substitute;
/// the sandbox engine walks the template's syntax so names referenced only
/// inside control flow still count as used. The path is for diagnostics.
pub fn extract_used_names(
    engine: TemplateEngine,
    text: &str,
    path: &Path,
) -> AppResult<BTreeSet<String>> {
    match engine {
        TemplateEngine::Literal => Ok(literal::extract_names(text)),
        TemplateEngine::Sandbox => sandbox::extract_names(text, path),
    }
}
