//! Literal substitution engine.
//!
//! Replaces every `{{name}}` token with the corresponding value from the
//! supplied mapping. A referenced name absent from the mapping substitutes
//! the empty string — render time is permissive here even though compile
//! time is strict about declare/use.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").expect("token pattern must compile")
});

/// Render a template by replacing `{{name}}` tokens.
pub fn render(template: &str, values: &HashMap<String, String>) -> String {
    TOKEN
        .replace_all(template, |caps: &regex::Captures<'_>| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Collect the names of all substitution tokens in a template.
pub fn extract_names(text: &str) -> BTreeSet<String> {
    TOKEN
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}
