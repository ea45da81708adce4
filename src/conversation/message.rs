// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Persisted conversation messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::metadata::{ArtifactInfo, MessageMetaData};

/// Author of a persisted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in an article's conversation.
///
/// Messages are append-only; only `metadata` is replaced after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub article_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetaData>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(article_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            article_id: article_id.into(),
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(article_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(article_id, MessageRole::User, content)
    }

    pub fn assistant(article_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(article_id, MessageRole::Assistant, content)
    }

    pub fn with_metadata(mut self, metadata: MessageMetaData) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn artifact(&self) -> Option<&ArtifactInfo> {
        self.metadata.as_ref().and_then(|m| m.artifact.as_ref())
    }

    /// Whether this message belongs in model history (plain user/assistant text).
    pub fn is_conversational(&self) -> bool {
        matches!(self.role, MessageRole::User | MessageRole::Assistant) && !self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::metadata::ArtifactType;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(MessageRole::Assistant).unwrap(), "assistant");
        let role: MessageRole = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, MessageRole::Tool);
    }

    #[test]
    fn test_artifact_accessor() {
        let plain = ChatMessage::assistant("a1", "hello");
        assert!(plain.artifact().is_none());

        let artifact = ArtifactInfo::pending(ArtifactType::Rewrite, "new");
        let with = ChatMessage::assistant("a1", "rewrite").with_metadata(
            MessageMetaData::default().with_artifact(artifact.clone()),
        );
        assert_eq!(with.artifact(), Some(&artifact));
    }

    #[test]
    fn test_is_conversational() {
        assert!(ChatMessage::user("a", "hi").is_conversational());
        assert!(!ChatMessage::user("a", "   ").is_conversational());
        assert!(!ChatMessage::new("a", MessageRole::Tool, "result").is_conversational());
    }
}
