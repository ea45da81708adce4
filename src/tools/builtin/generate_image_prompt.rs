// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Image prompt tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::artifacts::ArtifactDraft;
use crate::conversation::ArtifactType;
use crate::error::{Result, ScribeError};
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, TextGenerator, Tool, ToolContext, ToolResult};

use super::artifact_title;

const NAME: &str = "generate_image_prompt";

/// Tool for writing an image-generation prompt from document text
pub struct GenerateImagePromptTool {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl GenerateImagePromptTool {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for GenerateImagePromptTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Generate an image prompt that illustrates the given document content".to_string(),
            input_schema: SchemaBuilder::new()
                .string("content", "The content to illustrate", true)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, _context: &ToolContext) -> Result<ToolResult> {
        let content = required_str(&input, "content")?;
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ScribeError::Collaborator("text generation is not configured".to_string()))?;

        let prompt = generator
            .generate_image_prompt(content)
            .await
            .map_err(|e| ScribeError::ToolExecution(format!("Failed to generate image prompt: {}", e)))?;

        let output = json!({
            "prompt": prompt,
            "tool_name": NAME,
        });
        let draft = ArtifactDraft::new(ArtifactType::ImagePrompt, prompt).with_title(artifact_title(NAME));

        Ok(ToolResult::json(tool_use_id, &output).with_artifact(draft))
    }
}
