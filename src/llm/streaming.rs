// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response accumulation
//!
//! Folds completion events into the final content blocks while handing text
//! deltas back to the caller for forwarding.

use std::collections::HashMap;

use crate::error::{ApiError, Result};
use crate::llm::provider::{
    CompletionEvent, CompletionResponse, ContentBlockDelta, ContentBlockResponse, StopReason, Usage,
};

/// Accumulator for streaming response content
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    id: String,
    model: String,
    content_blocks: Vec<ContentBlockResponse>,
    /// Stream index -> position in `content_blocks`
    positions: HashMap<usize, usize>,
    tool_inputs: HashMap<usize, String>,
    stop_reason: Option<StopReason>,
    usage: Usage,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event in. Returns the text delta, if the event carried one.
    pub fn process_event(&mut self, event: CompletionEvent) -> Result<Option<String>> {
        match event {
            CompletionEvent::MessageStart { id, model } => {
                self.id = id;
                self.model = model;
            }
            CompletionEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                self.positions.insert(index, self.content_blocks.len());
                self.content_blocks.push(content_block);
            }
            CompletionEvent::ContentBlockDelta { index, delta } => match delta {
                ContentBlockDelta::TextDelta { text } => {
                    match self.block_mut(index) {
                        Some(ContentBlockResponse::Text { text: block_text }) => {
                            block_text.push_str(&text)
                        }
                        // Text without a started block opens one implicitly.
                        _ => {
                            self.positions.insert(index, self.content_blocks.len());
                            self.content_blocks.push(ContentBlockResponse::Text {
                                text: text.clone(),
                            });
                        }
                    }
                    return Ok(Some(text));
                }
                ContentBlockDelta::InputJsonDelta { partial_json } => {
                    self.tool_inputs
                        .entry(index)
                        .or_default()
                        .push_str(&partial_json);
                }
            },
            CompletionEvent::ContentBlockStop { index } => {
                if let Some(partial) = self.tool_inputs.remove(&index) {
                    if let Some(ContentBlockResponse::ToolUse { input, name, .. }) =
                        self.block_mut(index)
                    {
                        *input = serde_json::from_str(&partial).map_err(|e| {
                            ApiError::InvalidResponse(format!(
                                "tool input for {} is not valid JSON: {}",
                                name, e
                            ))
                        })?;
                    }
                }
            }
            CompletionEvent::MessageDelta { stop_reason, usage } => {
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason;
                }
                if let Some(usage) = usage {
                    self.usage = usage;
                }
            }
            CompletionEvent::Error {
                error_type,
                message,
            } => {
                return Err(ApiError::StreamError(format!("{}: {}", error_type, message)).into());
            }
            CompletionEvent::MessageStop | CompletionEvent::Ping => {}
        }
        Ok(None)
    }

    /// Consume the accumulator and build the final response.
    pub fn finish(self) -> CompletionResponse {
        let content = self
            .content_blocks
            .into_iter()
            .filter(|block| !matches!(block, ContentBlockResponse::Text { text } if text.is_empty()))
            .collect();
        CompletionResponse {
            id: self.id,
            model: self.model,
            content,
            stop_reason: self.stop_reason,
            usage: self.usage,
        }
    }

    fn block_mut(&mut self, index: usize) -> Option<&mut ContentBlockResponse> {
        let position = *self.positions.get(&index)?;
        self.content_blocks.get_mut(position)
    }
}
