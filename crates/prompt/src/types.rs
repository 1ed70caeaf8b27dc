//! Domain types for the prompt compiler and runtime registry.
//!
//! Everything that crosses the manifest boundary lives here: the compiled
//! `PromptDefinition`, the `Manifest` artifact, and the closed `Role` and
//! `TemplateEngine` enums both sides agree on.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Conversation role of a prompt message.
///
/// The role set is fixed; documents may only carry these three sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Parse a role heading, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Template engine selection.
///
/// Exactly two engines exist: `literal` replaces `{{name}}` tokens and
/// nothing else; `sandbox` evaluates a restricted expression language with
/// conditionals and loops. Both satisfy the same render contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngine {
    #[default]
    Literal,
    Sandbox,
}

impl TemplateEngine {
    /// Parse an engine tag from frontmatter.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "literal" => Some(Self::Literal),
            "sandbox" => Some(Self::Sandbox),
            _ => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Sandbox => "sandbox",
        }
    }
}

/// Specification of a named, substitutable block region.
///
/// A `default` of `None` means the document declared `"default": null`; it
/// is preserved as null in the manifest and treated as empty when applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpec {
    /// Whether the block may be omitted at render time
    #[serde(default = "default_optional")]
    pub optional: bool,

    /// Fallback value applied when the block is omitted
    #[serde(default = "default_value")]
    pub default: Option<String>,
}

fn default_optional() -> bool {
    true
}

fn default_value() -> Option<String> {
    Some(String::new())
}

/// One message of a prompt, in conversation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Message role
    pub role: Role,

    /// Raw template text for this message
    pub content: String,
}

/// A compiled prompt entry as it appears in the manifest.
///
/// `(id, version)` pairs are unique across a manifest. `variables` is the
/// sorted union of declared variable names and declared block names. The
/// `hash` is a SHA-256 digest of the canonical serialization of the entry
/// without the hash field itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Prompt identifier
    pub id: String,

    /// Prompt version string
    pub version: String,

    /// Free-form metadata carried through from the document
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Engine used to render every message of this prompt
    pub template_engine: TemplateEngine,

    /// Sorted union of declared variable and block names
    pub variables: Vec<String>,

    /// Declared block specifications
    #[serde(default)]
    pub blocks: BTreeMap<String, BlockSpec>,

    /// Ordered message list: system, user, then assistant if present
    #[serde(default)]
    pub messages: Vec<PromptMessage>,

    /// Content hash of the canonical entry
    pub hash: String,
}

impl PromptDefinition {
    /// Names of the declared blocks.
    pub fn block_names(&self) -> BTreeSet<String> {
        self.blocks.keys().cloned().collect()
    }

    /// Variables the caller must supply: declared names minus block names.
    pub fn required_vars(&self) -> BTreeSet<String> {
        self.variables
            .iter()
            .filter(|name| !self.blocks.contains_key(*name))
            .cloned()
            .collect()
    }
}

/// Manifest schema version written by this compiler.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// The compiled manifest artifact.
///
/// Written by the compiler, read by the registry — potentially in different
/// process lifetimes. Serialized with sorted keys and stable formatting so
/// that recompiling unchanged sources produces byte-identical output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version tag
    pub schema_version: u32,

    /// Compiled entries, ordered by source path
    #[serde(default)]
    pub prompts: Vec<PromptDefinition>,
}

/// One rendered prompt, produced per render call and owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPrompt {
    /// Final messages with all values substituted
    pub messages: Vec<PromptMessage>,
}

/// Typed frontmatter of one template document, produced by the validator.
#[derive(Debug, Clone)]
pub struct Frontmatter {
    pub id: String,
    pub version: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub variables: Vec<String>,
    pub blocks: BTreeMap<String, BlockSpec>,
    pub includes: Vec<String>,
    pub template_engine: TemplateEngine,
}

/// One parsed template document: raw frontmatter plus role sections.
///
/// Constructed fresh per parse call; immutable thereafter. The frontmatter
/// is kept raw here — the validator turns it into a [`Frontmatter`].
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    pub frontmatter: serde_json::Map<String, serde_json::Value>,
    pub sections: BTreeMap<Role, String>,
}
