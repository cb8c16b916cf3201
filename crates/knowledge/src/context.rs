//! Assembles retrieved passages into a grounded prompt for an external
//! answer generator.

use crate::error::{IndexError, IndexResult};
use crate::types::RetrievalResult;
use handlebars::Handlebars;
use serde::Serialize;

const TEMPLATE_NAME: &str = "context";

pub const DEFAULT_TEMPLATE: &str = "\
You answer questions using only the numbered passages below, taken from the user's documents.
Cite the passages you rely on by number, for example [1] or [2][3].
If the passages do not contain the answer, say that the documents do not cover it. Do not guess.

Passages:
{{#each passages}}
[{{number}}] {{source}} (part {{ordinal}})
{{text}}

{{/each}}
Question: {{query}}
Answer:";

/// One numbered passage of the assembled context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPassage {
    /// 1-based, in rank order
    pub number: usize,
    pub source: String,
    pub chunk_id: String,
    pub ordinal: u32,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextPayload {
    pub query: String,
    pub generation: u64,
    pub passages: Vec<ContextPassage>,
    pub prompt: String,
}

/// Renders [`ContextPayload`]s from retrieval results.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    handlebars: Handlebars<'static>,
}

impl ContextBuilder {
    pub fn new() -> IndexResult<Self> {
        Self::with_template(DEFAULT_TEMPLATE)
    }

    /// Use a custom Handlebars template. It sees `query`, `generation` and
    /// `passages` (each with `number`, `source`, `chunk_id`, `ordinal`,
    /// `score`, `text`).
    pub fn with_template(template: &str) -> IndexResult<Self> {
        let mut handlebars = Handlebars::new();
        // Plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| IndexError::InvalidConfig(format!("invalid prompt template: {}", e)))?;
        Ok(Self { handlebars })
    }

    pub fn assemble(&self, query: &str, result: &RetrievalResult) -> IndexResult<ContextPayload> {
        let passages: Vec<ContextPassage> = result
            .iter()
            .enumerate()
            .map(|(i, hit)| ContextPassage {
                number: i + 1,
                source: hit.chunk.source_name().unwrap_or(&hit.chunk.document_id).to_string(),
                chunk_id: hit.chunk.id.clone(),
                ordinal: hit.chunk.ordinal,
                score: hit.score,
                text: hit.chunk.text.clone(),
            })
            .collect();

        let mut payload = ContextPayload {
            query: query.to_string(),
            generation: result.generation,
            passages,
            prompt: String::new(),
        };
        payload.prompt = self
            .handlebars
            .render(TEMPLATE_NAME, &payload)
            .map_err(|e| IndexError::InvalidArgument(format!("failed to render prompt: {}", e)))?;

        Ok(payload)
    }
}
