// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Analyze document tool

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{optional_str, required_str, SchemaBuilder, Tool, ToolContext, ToolResult};

const NAME: &str = "analyze_document";

/// Keyword groups checked in order; the first hit names the focus area
const FOCUS_KEYWORDS: &[(&[&str], &str)] = &[
    (&["engaging", "boring"], "engagement"),
    (&["clear", "confusing"], "clarity"),
    (&["structure", "organize"], "structure"),
    (&["grammar", "spelling"], "grammar"),
];

/// Tool that records what aspect of the document the user wants improved
pub struct AnalyzeDocumentTool;

fn infer_focus_area(user_request: &str) -> &'static str {
    let request = user_request.to_lowercase();
    FOCUS_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| request.contains(k)))
        .map_or("overall", |(_, area)| area)
}

#[async_trait]
impl Tool for AnalyzeDocumentTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Analyze the document and decide what to improve. Optionally focus on one area \
                          (structure, clarity, engagement, grammar, flow, technical_accuracy); otherwise the \
                          focus is inferred from the request."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("user_request", "The user's original request", true)
                .string("focus_area", "Aspect to focus on", false)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, _context: &ToolContext) -> Result<ToolResult> {
        let user_request = required_str(&input, "user_request")?;
        let focus_area = optional_str(&input, "focus_area").unwrap_or_else(|| infer_focus_area(user_request));

        let output = json!({
            "focus_area": focus_area,
            "user_request": user_request,
            "analysis_done": true,
            "tool_name": NAME,
        });
        Ok(ToolResult::json(tool_use_id, &output))
    }
}
