// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Relevant sources tool
//!
//! Finds the passages of an article's research sources that best match a
//! query. Without an article there is nothing to search, so the tool returns
//! an empty set with a warning instead of failing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{Result, ScribeError};
use crate::llm::provider::ToolDefinition;
use crate::tools::chunking::{chunk_text, most_relevant, CHUNK_SIZE};
use crate::tools::{required_str, SchemaBuilder, SourceSearch, Tool, ToolContext, ToolResult};

const NAME: &str = "get_relevant_sources";

/// Sources requested when the model gives no limit
pub const DEFAULT_SOURCE_LIMIT: usize = 5;

/// Chunks kept per source
const CHUNKS_PER_SOURCE: usize = 2;

/// Tool for finding source passages relevant to a query
pub struct RelevantSourcesTool {
    sources: Option<Arc<dyn SourceSearch>>,
}

impl RelevantSourcesTool {
    pub fn new(sources: Option<Arc<dyn SourceSearch>>) -> Self {
        Self { sources }
    }

    /// Search and chunk sources, returning the tool's JSON output.
    pub async fn find(&self, query: &str, limit: usize, context: &ToolContext) -> Result<Value> {
        let Some(article_id) = context.article_id.as_deref() else {
            tracing::warn!("No article ID in context, returning empty sources");
            return Ok(json!({
                "relevant_sources": [],
                "query": query,
                "total_found": 0,
                "tool_name": NAME,
                "warning": "No article ID available - returned empty sources",
            }));
        };

        let search = self
            .sources
            .as_ref()
            .ok_or_else(|| ScribeError::Collaborator("source search is not configured".to_string()))?;

        let sources = search.search_similar(article_id, query, limit).await?;
        tracing::debug!(article_id, found = sources.len(), "Source search finished");

        let mut relevant = Vec::new();
        for source in &sources {
            let chunks = most_relevant(chunk_text(&source.content, CHUNK_SIZE), query, CHUNKS_PER_SOURCE);
            for (rank, chunk) in chunks.into_iter().enumerate() {
                relevant.push(json!({
                    "source_title": source.title,
                    "source_url": source.url,
                    "text_chunk": chunk.text,
                    "source_type": source.source_type,
                    "chunk_score": chunk.score,
                    "chunk_index": rank + 1,
                }));
            }
        }

        Ok(json!({
            "total_found": relevant.len(),
            "relevant_sources": relevant,
            "query": query,
            "tool_name": NAME,
        }))
    }
}

#[async_trait]
impl Tool for RelevantSourcesTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Find passages from the article's research sources that are relevant to a query. \
                          Use this to ground rewrites and claims in the sources the author collected."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("query", "What to look for in the sources", true)
                .integer("limit", "Maximum number of sources to search (default: 5)", false)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, context: &ToolContext) -> Result<ToolResult> {
        let query = required_str(&input, "query")?;
        let limit = input["limit"]
            .as_u64()
            .filter(|limit| *limit > 0)
            .map_or(DEFAULT_SOURCE_LIMIT, |limit| limit as usize);

        let output = self.find(query, limit, context).await?;
        Ok(ToolResult::json(tool_use_id, &output).with_metadata(output))
    }
}
