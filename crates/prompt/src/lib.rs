//! Prompt compiler and runtime registry for Manifold.
//!
//! This crate provides the whole prompt lifecycle:
//! - Parsing and validating template documents (JSON frontmatter plus
//!   role-keyed sections)
//! - Merging shared includes into prompt sections
//! - Compiling a source tree into a deterministic, content-addressed
//!   manifest
//! - Loading a manifest into an immutable registry and rendering prompts
//!   through the literal or sandboxed template engine

pub mod compiler;
pub mod demo;
pub mod engine;
pub mod enrich;
pub mod include;
pub mod parser;
pub mod registry;
pub mod types;
pub mod validate;

// Re-export main types
pub use compiler::compile;
pub use enrich::{Enricher, EnrichmentPipeline};
pub use registry::PromptRegistry;
pub use types::{
    BlockSpec, Manifest, PromptDefinition, PromptMessage, RenderedPrompt, Role, TemplateEngine,
    MANIFEST_SCHEMA_VERSION,
};
