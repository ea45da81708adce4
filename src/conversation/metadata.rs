// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Structured message metadata
//!
//! Optional records attached to a stored message: the artifact it proposes,
//! the task it reports on, the tool call that produced it, the request
//! context, the user's response to an artifact and attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Metadata blob stored alongside a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetaData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<TaskStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_execution: Option<ToolExecution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_action: Option<UserAction>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingBlock>,
}

/// A proposed document edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub status: ArtifactStatus,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    CodeEdit,
    Rewrite,
    Suggestion,
    ContentGeneration,
    ImagePrompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Pending,
    Accepted,
    Rejected,
    Applied,
}

/// Progress of a long-running task, as shown on a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub name: String,
    pub status: TaskProgressState,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskProgressState {
    Queued,
    InProgress,
    Completed,
    Failed,
}

/// Record of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool_name: String,
    pub tool_id: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
}

/// Where and for which request a message was written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContext {
    pub article_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// A human response to an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub action: UserActionKind,
    pub timestamp: DateTime<Utc>,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserActionKind {
    Accept,
    Reject,
    Modify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    File,
    Link,
    Image,
}

/// Model reasoning shown alongside a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingBlock {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub visible: bool,
}

impl MessageMetaData {
    pub fn with_artifact(mut self, artifact: ArtifactInfo) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_task_status(mut self, task_status: TaskStatus) -> Self {
        self.task_status = Some(task_status);
        self
    }

    pub fn with_tool_execution(mut self, tool_execution: ToolExecution) -> Self {
        self.tool_execution = Some(tool_execution);
        self
    }

    pub fn with_context(mut self, context: MessageContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_user_action(mut self, user_action: UserAction) -> Self {
        self.user_action = Some(user_action);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_thinking(mut self, thinking: ThinkingBlock) -> Self {
        self.thinking = Some(thinking);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl ArtifactInfo {
    /// A new pending artifact with a fresh id.
    pub fn pending(artifact_type: ArtifactType, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            artifact_type,
            status: ArtifactStatus::Pending,
            content: content.into(),
            diff_preview: None,
            title: None,
            description: None,
            applied_at: None,
        }
    }
}

impl ArtifactStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ArtifactStatus::Rejected | ArtifactStatus::Applied)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ArtifactStatus) -> bool {
        matches!(
            (self, next),
            (ArtifactStatus::Pending, ArtifactStatus::Accepted)
                | (ArtifactStatus::Pending, ArtifactStatus::Rejected)
                | (ArtifactStatus::Accepted, ArtifactStatus::Applied)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Accepted => "accepted",
            ArtifactStatus::Rejected => "rejected",
            ArtifactStatus::Applied => "applied",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ArtifactType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactType::CodeEdit => "code_edit",
            ArtifactType::Rewrite => "rewrite",
            ArtifactType::Suggestion => "suggestion",
            ArtifactType::ContentGeneration => "content_generation",
            ArtifactType::ImagePrompt => "image_prompt",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TaskStatus {
    pub fn queued(task_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            status: TaskProgressState::Queued,
            progress: 0.0,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = TaskProgressState::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = TaskProgressState::Completed;
        self.progress = 100.0;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskProgressState::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Set progress, clamped to 0..=100.
    pub fn update_progress(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 100.0);
    }
}

impl ToolExecution {
    pub fn new(
        tool_name: impl Into<String>,
        tool_id: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_id: tool_id.into(),
            input,
            output,
            success: error.is_none(),
            error,
            duration_ms: duration.as_millis() as u64,
            executed_at: Utc::now(),
        }
    }
}

impl MessageContext {
    pub fn new(article_id: impl Into<String>) -> Self {
        Self {
            article_id: article_id.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl ToString) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_request(mut self, request_id: impl ToString) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    /// Record the sha256 of the document the message was written against.
    pub fn with_document_hash(mut self, content: &str) -> Self {
        self.document_hash = Some(document_hash(content));
        self
    }
}

impl UserAction {
    pub fn new(action: UserActionKind, artifact_id: impl Into<String>) -> Self {
        Self {
            action,
            timestamp: Utc::now(),
            artifact_id: artifact_id.into(),
            feedback: None,
            reason: None,
        }
    }
}

/// Hex-encoded sha256 of a document's content.
pub fn document_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
