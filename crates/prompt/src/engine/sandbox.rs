//! Sandboxed expression engine.
//!
//! Templates here are user-authored content, so the environment starts
//! empty: no ambient globals, filters, or tests. Undefined references fail
//! the render instead of silently defaulting, and auto-escaping is off —
//! output is plain text, not HTML.

use manifold_core::{AppError, AppResult};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Build the locked-down environment used for every render and parse.
fn environment() -> Environment<'static> {
    let mut env = Environment::empty();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env
}

/// Render a template with strict-undefined semantics.
pub fn render(template: &str, values: &HashMap<String, String>) -> AppResult<String> {
    let env = environment();
    let tmpl = env
        .template_from_str(template)
        .map_err(|e| AppError::Input(format!("Template syntax error: {}", e)))?;
    tmpl.render(values)
        .map_err(|e| AppError::Input(format!("Template render failure: {}", e)))
}

/// Statically extract the free variable names a template references.
///
/// Names referenced only inside control flow (conditionals, loop bodies)
/// count as used; loop-bound names do not.
pub fn extract_names(text: &str, path: &Path) -> AppResult<BTreeSet<String>> {
    let env = environment();
    let tmpl = env.template_from_str(text).map_err(|e| {
        AppError::Compile(format!("Template syntax error in {}: {}", path.display(), e))
    })?;
    Ok(tmpl.undeclared_variables(false).into_iter().collect())
}
