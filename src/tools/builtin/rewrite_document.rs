// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Rewrite document tool
//!
//! Proposes a full replacement of the document. When the original is given
//! the result carries a patch and any source passages related to the rewrite.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::artifacts::ArtifactDraft;
use crate::conversation::ArtifactType;
use crate::diff::DiffPatch;
use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{optional_str, required_str, SchemaBuilder, SourceSearch, Tool, ToolContext, ToolResult};

use super::relevant_sources::{RelevantSourcesTool, DEFAULT_SOURCE_LIMIT};
use super::{artifact_title, DIFF_PREVIEW_CHARS};

const NAME: &str = "rewrite_document";

/// Characters of the original used to build the source query
const QUERY_SAMPLE_CHARS: usize = 200;

/// Tool for proposing a complete rewrite
pub struct RewriteDocumentTool {
    sources: Option<RelevantSourcesTool>,
}

impl RewriteDocumentTool {
    pub fn new(sources: Option<Arc<dyn SourceSearch>>) -> Self {
        Self {
            sources: sources.map(|search| RelevantSourcesTool::new(Some(search))),
        }
    }

    async fn related_sources(&self, original: &str, reason: &str, context: &ToolContext) -> Vec<Value> {
        let Some(tool) = &self.sources else {
            tracing::debug!("No source search configured, skipping source lookup");
            return vec![];
        };

        let query = search_query(original, reason);
        match tool.find(&query, DEFAULT_SOURCE_LIMIT, context).await {
            Ok(output) => {
                if let Some(warning) = output["warning"].as_str() {
                    tracing::warn!(warning, "Source lookup for rewrite returned a warning");
                }
                output["relevant_sources"].as_array().cloned().unwrap_or_default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Source lookup for rewrite failed, continuing without sources");
                vec![]
            }
        }
    }
}

/// `reason` followed by the start of the original with markdown markers removed.
fn search_query(original: &str, reason: &str) -> String {
    let sample: String = original.chars().take(QUERY_SAMPLE_CHARS).collect();
    let sample = sample.replace('\n', " ").replace(['#', '*'], "");
    let sample = sample.trim();
    if sample.is_empty() {
        reason.to_string()
    } else {
        format!("{} {}", reason, sample)
    }
}

#[async_trait]
impl Tool for RewriteDocumentTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Rewrite or substantially edit the whole document. Write like a person: no puffery, \
                          no filler phrases, no section summaries, varied sentence structure and concrete detail. \
                          Pass original_content to get a diff preview."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("new_content", "The new document content in markdown", true)
                .string("reason", "Brief explanation of the changes", true)
                .string("original_content", "The current document content, for diff generation", false)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, context: &ToolContext) -> Result<ToolResult> {
        let new_content = required_str(&input, "new_content")?;
        let reason = input["reason"].as_str().unwrap_or_default();
        let original = optional_str(&input, "original_content");

        let mut output = json!({
            "new_content": new_content,
            "reason": reason,
            "tool_name": NAME,
            "edit_type": "rewrite",
        });

        let mut draft = ArtifactDraft::new(ArtifactType::Rewrite, new_content).with_title(artifact_title(NAME));
        if !reason.is_empty() {
            draft = draft.with_description(reason);
        }

        if let Some(original) = original {
            let sources = self.related_sources(original, reason, context).await;
            if !sources.is_empty() {
                output["sources_used"] = json!(sources.len());
                output["relevant_sources"] = Value::Array(sources);
            }

            let patch = DiffPatch::new(original, new_content);
            output["original_content"] = json!(original);
            output["patch"] = json!({
                "unified_diff": patch.unified_diff,
                "summary": patch.summary(),
            });
            draft = draft.with_diff_preview(patch.preview(DIFF_PREVIEW_CHARS));
        }

        Ok(ToolResult::json(tool_use_id, &output)
            .with_metadata(output.clone())
            .with_artifact(draft))
    }
}
