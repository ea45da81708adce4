// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted LLM provider
//!
//! Replays a fixed list of turns, one per call, repeating the last turn once
//! the script runs out. Used by tests and by the CLI in place of a real model.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ApiError, Result, ScribeError};
use crate::llm::provider::{
    CompletionEvent, CompletionRequest, CompletionResponse, CompletionStream, ContentBlockDelta,
    ContentBlockResponse, LlmProvider, StopReason, Usage,
};

/// Characters per streamed text delta
const DELTA_CHARS: usize = 10;

/// One scripted model turn
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Text, optionally followed by tool calls
    Turn {
        text: String,
        tool_calls: Vec<MockToolCall>,
    },
    /// The call is rate limited for the given seconds
    RateLimited(u32),
    /// The call fails with a server error
    Failure(String),
}

#[derive(Clone, Debug)]
pub struct MockToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Turn {
            text: text.into(),
            tool_calls: vec![],
        }
    }

    pub fn tool_call(name: impl Into<String>, input: serde_json::Value) -> Self {
        MockResponse::Turn {
            text: String::new(),
            tool_calls: vec![MockToolCall::new(name, input)],
        }
    }

    /// Text preceding one or more tool calls.
    pub fn text_with_tools(text: impl Into<String>, tool_calls: Vec<MockToolCall>) -> Self {
        MockResponse::Turn {
            text: text.into(),
            tool_calls,
        }
    }
}

impl MockToolCall {
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            input,
        }
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        MockResponse::text("Mock response")
    }
}

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    script: Arc<Mutex<Vec<MockResponse>>>,
    call_count: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(vec![MockResponse::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            delay: Duration::ZERO,
        }
    }

    /// Always answer with `text`.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::text(text)])
    }

    /// Replace the script.
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        *lock(&self.script) = script;
        self
    }

    /// Wait this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        lock(&self.recorded_requests).clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    async fn next_turn(&self, request: &CompletionRequest) -> Result<(String, Vec<MockToolCall>)> {
        lock(&self.recorded_requests).push(request.clone());
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = {
            let script = lock(&self.script);
            match script.len() {
                0 => MockResponse::default(),
                len => script[count.min(len - 1)].clone(),
            }
        };

        match response {
            MockResponse::Turn { text, tool_calls } => Ok((text, tool_calls)),
            MockResponse::RateLimited(seconds) => Err(ApiError::RateLimited(seconds).into()),
            MockResponse::Failure(message) => Err(ScribeError::Api(ApiError::ServerError {
                status: 500,
                message,
            })),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn stop_reason(tool_calls: &[MockToolCall]) -> StopReason {
    if tool_calls.is_empty() {
        StopReason::EndTurn
    } else {
        StopReason::ToolUse
    }
}

fn usage(text: &str) -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: (text.len() / 4).max(1) as u32,
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let (text, tool_calls) = self.next_turn(&request).await?;

        let mut content = vec![];
        let stop = stop_reason(&tool_calls);
        let usage = usage(&text);
        if !text.is_empty() {
            content.push(ContentBlockResponse::Text { text });
        }
        for call in tool_calls {
            content.push(ContentBlockResponse::ToolUse {
                id: call.id,
                name: call.name,
                input: call.input,
            });
        }

        Ok(CompletionResponse {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            model: request.model,
            content,
            stop_reason: Some(stop),
            usage,
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let (text, tool_calls) = self.next_turn(&request).await?;

        let mut events = vec![CompletionEvent::MessageStart {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            model: request.model.clone(),
        }];
        let stop = stop_reason(&tool_calls);
        let usage = usage(&text);

        let mut index = 0;
        if !text.is_empty() {
            events.push(CompletionEvent::ContentBlockStart {
                index,
                content_block: ContentBlockResponse::Text {
                    text: String::new(),
                },
            });
            let chars: Vec<char> = text.chars().collect();
            for chunk in chars.chunks(DELTA_CHARS) {
                events.push(CompletionEvent::ContentBlockDelta {
                    index,
                    delta: ContentBlockDelta::TextDelta {
                        text: chunk.iter().collect(),
                    },
                });
            }
            events.push(CompletionEvent::ContentBlockStop { index });
            index += 1;
        }

        for call in tool_calls {
            let partial_json = call.input.to_string();
            events.push(CompletionEvent::ContentBlockStart {
                index,
                content_block: ContentBlockResponse::ToolUse {
                    id: call.id,
                    name: call.name,
                    input: serde_json::Value::Object(Default::default()),
                },
            });
            events.push(CompletionEvent::ContentBlockDelta {
                index,
                delta: ContentBlockDelta::InputJsonDelta { partial_json },
            });
            events.push(CompletionEvent::ContentBlockStop { index });
            index += 1;
        }

        events.push(CompletionEvent::MessageDelta {
            stop_reason: Some(stop),
            usage: Some(usage),
        });
        events.push(CompletionEvent::MessageStop);

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
