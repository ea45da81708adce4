// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Read document tool
//!
//! Shows the working document with line numbers, optionally limited to a
//! line range.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolResult};

const NAME: &str = "read_document";

/// Tool for reading the current document
pub struct ReadDocumentTool;

fn line_arg(input: &Value, field: &str) -> Option<usize> {
    input[field].as_u64().filter(|n| *n > 0).map(|n| n as usize)
}

#[async_trait]
impl Tool for ReadDocumentTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Read the current document (markdown) with line numbers. Call this before edit_text \
                          to find the exact text to change."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .integer("start_line", "First line to show (1-indexed)", false)
                .integer("end_line", "Last line to show (inclusive)", false)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, context: &ToolContext) -> Result<ToolResult> {
        let Some(document) = context.document().await else {
            return Ok(ToolResult::error(
                tool_use_id,
                "No document content available. The document may be empty or not loaded.",
            ));
        };

        let lines: Vec<&str> = document.split('\n').collect();
        let total = lines.len();

        let start = match line_arg(&input, "start_line") {
            Some(line) if line > total => {
                return Ok(ToolResult::error(
                    tool_use_id,
                    format!("Start line {} exceeds document length ({} lines)", line, total),
                ));
            }
            Some(line) => line - 1,
            None => 0,
        };
        let end = line_arg(&input, "end_line").map_or(total, |line| line.min(total));

        let content = lines
            .iter()
            .enumerate()
            .take(end)
            .skip(start)
            .map(|(i, line)| format!("{:4}| {}", i + 1, line))
            .collect::<Vec<_>>()
            .join("\n");

        let output = json!({
            "content": content,
            "total_lines": total,
            "showing": format!("lines {}-{} of {}", start + 1, end, total),
            "tool_name": NAME,
        });
        Ok(ToolResult::json(tool_use_id, &output))
    }
}
