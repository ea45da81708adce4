// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Content generation tool
//!
//! Builds a prompt from the request, any context sources and the content
//! being replaced, then has the text generator write the result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::artifacts::ArtifactDraft;
use crate::conversation::ArtifactType;
use crate::error::{Result, ScribeError};
use crate::llm::provider::ToolDefinition;
use crate::tools::{optional_str, required_str, SchemaBuilder, TextGenerator, Tool, ToolContext, ToolResult};

use super::artifact_title;

const NAME: &str = "generate_text_content";

/// A source excerpt the generated text should draw on
#[derive(Debug, Clone, Deserialize)]
struct ContextSource {
    #[serde(default)]
    source_title: String,
    #[serde(default)]
    source_url: String,
    #[serde(default)]
    text_chunk: String,
}

/// Tool for writing new article content
pub struct GenerateTextContentTool {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl GenerateTextContentTool {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }
}

fn context_sources(input: &Value) -> Result<Vec<ContextSource>> {
    match input.get("context_sources") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ScribeError::InvalidInput(format!("context_sources is malformed: {}", e))),
    }
}

fn build_prompt(prompt: &str, sources: &[ContextSource], original: Option<&str>) -> String {
    let mut full = prompt.to_string();
    if !sources.is_empty() {
        full.push_str("\n\n--- Relevant Context Sources ---\n");
        for (i, source) in sources.iter().enumerate() {
            full.push_str(&format!(
                "\n{}. {} ({})\n{}\n",
                i + 1,
                source.source_title,
                source.source_url,
                source.text_chunk
            ));
        }
    }
    if let Some(original) = original {
        full.push_str("\n\n--- Original Content ---\n");
        full.push_str(original);
    }
    full
}

#[async_trait]
impl Tool for GenerateTextContentTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Generate new text content for the article, optionally grounded in context sources \
                          or rewriting original content."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("prompt", "What content to write", true)
                .array(
                    "context_sources",
                    "Source excerpts to draw on",
                    json!({
                        "type": "object",
                        "properties": {
                            "source_title": {"type": "string"},
                            "source_url": {"type": "string"},
                            "text_chunk": {"type": "string"}
                        }
                    }),
                    false,
                )
                .string("original_content", "Existing content to improve or replace", false)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, _context: &ToolContext) -> Result<ToolResult> {
        let prompt = required_str(&input, "prompt")?;
        let sources = context_sources(&input)?;
        let original = optional_str(&input, "original_content");
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ScribeError::Collaborator("text generation is not configured".to_string()))?;

        let full_prompt = build_prompt(prompt, &sources, original);
        let content = generator
            .generate_text(&full_prompt)
            .await
            .map_err(|e| ScribeError::ToolExecution(format!("Failed to generate content: {}", e)))?;

        tracing::debug!(
            sources = sources.len(),
            has_original = original.is_some(),
            chars = content.chars().count(),
            "Generated text content"
        );

        let output = json!({
            "generated_content": content,
            "prompt_used": full_prompt,
            "sources_included": sources.len(),
            "has_original": original.is_some(),
            "tool_name": NAME,
            "generation_method": "llm",
        });
        let draft = ArtifactDraft::new(ArtifactType::ContentGeneration, content)
            .with_title(artifact_title(NAME))
            .with_description(prompt);

        Ok(ToolResult::json(tool_use_id, &output).with_artifact(draft))
    }
}
