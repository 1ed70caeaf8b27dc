//! Enrichment pipeline: pure block rewrites applied just before rendering.
//!
//! Each enricher receives the resolved definition, the normalized
//! variables, and the current blocks snapshot, and returns a partial update
//! merged into the working blocks map. No state persists between renders.

use std::collections::HashMap;

use crate::types::PromptDefinition;

/// One enrichment step.
pub type Enricher = Box<
    dyn Fn(&PromptDefinition, &HashMap<String, String>, &HashMap<String, String>) -> HashMap<String, String>
        + Send
        + Sync,
>;

/// An ordered sequence of enrichers.
pub struct EnrichmentPipeline {
    enrichers: Vec<Enricher>,
}

impl EnrichmentPipeline {
    /// Create a pipeline from ordered enrichers.
    pub fn new(enrichers: Vec<Enricher>) -> Self {
        Self { enrichers }
    }

    /// Apply enrichers sequentially, returning the updated blocks map.
    pub fn apply(
        &self,
        prompt: &PromptDefinition,
        vars: &HashMap<String, String>,
        blocks: HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut enriched = blocks;
        for enricher in &self.enrichers {
            let updates = enricher(prompt, vars, &enriched);
            enriched.extend(updates);
        }
        enriched
    }
}

impl std::fmt::Debug for EnrichmentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentPipeline")
            .field("enrichers", &self.enrichers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TemplateEngine;
    use std::collections::BTreeMap;

    fn test_definition() -> PromptDefinition {
        PromptDefinition {
            id: "p".to_string(),
            version: "v1".to_string(),
            metadata: BTreeMap::new(),
            template_engine: TemplateEngine::Literal,
            variables: Vec::new(),
            blocks: BTreeMap::new(),
            messages: Vec::new(),
            hash: String::new(),
        }
    }

    #[test]
    fn test_enrichers_apply_in_order() {
        let pipeline = EnrichmentPipeline::new(vec![
            Box::new(|_, _, _| {
                let mut updates = HashMap::new();
                updates.insert("_context".to_string(), "first".to_string());
                updates
            }),
            Box::new(|_, _, blocks| {
                let mut updates = HashMap::new();
                let previous = blocks.get("_context").cloned().unwrap_or_default();
                updates.insert("_context".to_string(), format!("{}+second", previous));
                updates
            }),
        ]);

        let result = pipeline.apply(&test_definition(), &HashMap::new(), HashMap::new());
        assert_eq!(result["_context"], "first+second");
    }

    #[test]
    fn test_enricher_sees_vars() {
        let pipeline = EnrichmentPipeline::new(vec![Box::new(|_, vars, _| {
            let mut updates = HashMap::new();
            let question = vars.get("question").cloned().unwrap_or_default();
            updates.insert("_context".to_string(), format!("enriched:{}", question));
            updates
        })]);

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Hi".to_string());
        let result = pipeline.apply(&test_definition(), &vars, HashMap::new());
        assert_eq!(result["_context"], "enriched:Hi");
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline = EnrichmentPipeline::new(Vec::new());
        let mut blocks = HashMap::new();
        blocks.insert("_context".to_string(), "kept".to_string());
        let result = pipeline.apply(&test_definition(), &HashMap::new(), blocks.clone());
        assert_eq!(result, blocks);
    }
}
