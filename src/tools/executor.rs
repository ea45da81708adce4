// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Dispatches tool calls from a model response and turns every outcome,
//! including unknown tools and tool failures, into a result the model sees.
//! Only cancellation escapes as an error.

use crate::error::{Result, ScribeError};
use crate::llm::message::{ContentBlock, Message};
use crate::llm::provider::ToolDefinition;

use super::{ToolContext, ToolRegistry, ToolResult};

/// Tool executor bound to one request's context
pub struct ToolExecutor {
    registry: ToolRegistry,
    context: ToolContext,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, context: ToolContext) -> Self {
        Self { registry, context }
    }

    /// Get tool definitions for the LLM
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Execute a single tool call.
    pub async fn execute_tool_use(
        &self,
        tool_use_id: &str,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<ToolResult> {
        if self.context.is_cancelled() {
            return Err(ScribeError::Cancelled(format!("tool {} not started", tool_name)));
        }

        let Some(tool) = self.registry.get(tool_name).cloned() else {
            tracing::warn!(tool = tool_name, "Model requested an unknown tool");
            return Ok(ToolResult::error(
                tool_use_id,
                format!("Unknown tool: {}", tool_name),
            ));
        };

        tracing::debug!(tool = tool_name, tool_use_id, "Executing tool");
        let execution = tool.execute(tool_use_id.to_string(), input, &self.context);

        tokio::select! {
            _ = self.context.cancel.cancelled() => {
                Err(ScribeError::Cancelled(format!("tool {} interrupted", tool_name)))
            }
            outcome = execution => match outcome {
                Ok(result) => Ok(result),
                Err(e) if e.is_interruption() => Err(e),
                Err(e) => {
                    tracing::debug!(tool = tool_name, error = %e, "Tool failed");
                    Ok(ToolResult::error(tool_use_id, e.to_string()))
                }
            },
        }
    }

    /// Convert tool results to the message that follows the tool calls
    pub fn results_to_message<'a>(results: impl IntoIterator<Item = &'a ToolResult>) -> Message {
        let blocks: Vec<ContentBlock> = results
            .into_iter()
            .map(|r| ContentBlock::ToolResult {
                tool_use_id: r.tool_use_id.clone(),
                content: r.output_text().to_string(),
                is_error: r.is_error().then_some(true),
            })
            .collect();

        Message::tool_results(blocks)
    }
}
