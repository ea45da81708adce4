// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Stream events
//!
//! Everything a running request tells its subscriber travels as a
//! [`StreamEvent`]: one JSON object per event with a `type` tag, the owning
//! request id and a `done` flag set on terminal events.

pub mod broker;

pub use broker::{Broker, EventType, SubscriptionId};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ChatMessage;

/// One ordered event on a request's output queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub kind: StreamEventKind,
    pub done: bool,
}

/// Payload of a stream event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventKind {
    /// Incremental model output
    ContentDelta { content: String },
    /// A complete block of assistant text
    Text { content: String },
    /// The model asked for a tool
    ToolUse {
        tool_id: String,
        tool_name: String,
        tool_input: serde_json::Value,
    },
    /// A tool finished (successfully or not)
    ToolResult { tool_result: ToolResultPayload },
    /// A message was persisted, in its stored shape
    FullMessage { message: ChatMessage },
    /// Progress note while the request is still running
    Thinking { message: String },
    /// The request failed; always terminal
    Error { message: String },
    /// The request finished; always terminal
    Done,
}

/// What a subscriber learns about a finished tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub tool_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub is_search: bool,
}

impl StreamEvent {
    pub fn new(request_id: Uuid, kind: StreamEventKind) -> Self {
        let done = kind.is_terminal();
        Self {
            request_id,
            kind,
            done,
        }
    }

    pub fn content_delta(request_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(
            request_id,
            StreamEventKind::ContentDelta {
                content: content.into(),
            },
        )
    }

    pub fn text(request_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(
            request_id,
            StreamEventKind::Text {
                content: content.into(),
            },
        )
    }

    pub fn thinking(request_id: Uuid, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            StreamEventKind::Thinking {
                message: message.into(),
            },
        )
    }

    pub fn error(request_id: Uuid, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            StreamEventKind::Error {
                message: message.into(),
            },
        )
    }

    pub fn done(request_id: Uuid) -> Self {
        Self::new(request_id, StreamEventKind::Done)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// The wire tag of this event (`"content_delta"`, `"done"`, ...).
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

impl StreamEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEventKind::Error { .. } | StreamEventKind::Done)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StreamEventKind::ContentDelta { .. } => "content_delta",
            StreamEventKind::Text { .. } => "text",
            StreamEventKind::ToolUse { .. } => "tool_use",
            StreamEventKind::ToolResult { .. } => "tool_result",
            StreamEventKind::FullMessage { .. } => "full_message",
            StreamEventKind::Thinking { .. } => "thinking",
            StreamEventKind::Error { .. } => "error",
            StreamEventKind::Done => "done",
        }
    }
}
