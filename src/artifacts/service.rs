// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Artifact lifecycle service
//!
//! All status changes go through one transition lock so two concurrent
//! actions on the same artifact cannot both succeed.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ArtifactDraft, DocumentStore, InMemoryDocumentStore};
use crate::conversation::{
    validate_metadata, ArtifactInfo, ArtifactStatus, ChatMessage, InMemoryMessageStore, MessageMetaData,
    MessageStore, UserAction, UserActionKind,
};
use crate::error::{Result, ScribeError};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 200;

/// First assistant message of a new conversation
pub const INITIAL_GREETING: &str = "Hi! I can help you improve your article. Try asking me to \"rewrite the introduction\" or \"make the content more engaging\".";

pub struct ArtifactService {
    messages: Arc<dyn MessageStore>,
    documents: Arc<dyn DocumentStore>,
    transitions: Mutex<()>,
}

impl ArtifactService {
    pub fn new(messages: Arc<dyn MessageStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            messages,
            documents,
            transitions: Mutex::new(()),
        }
    }

    /// Service over in-memory message and document stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(InMemoryDocumentStore::new()),
        )
    }

    /// The conversation store artifacts live in.
    pub fn messages(&self) -> &Arc<dyn MessageStore> {
        &self.messages
    }

    /// Save `message` and attach `draft` to it as a pending artifact.
    pub async fn create_artifact_message(&self, message: ChatMessage, draft: ArtifactDraft) -> Result<ChatMessage> {
        validate_metadata(&message.metadata.clone().unwrap_or_default())?;
        let saved = self.messages.create(message).await?;
        self.attach_artifact(saved.id, draft).await?;
        self.get_message(saved.id).await
    }

    /// Attach a pending artifact to an existing message.
    pub async fn attach_artifact(&self, message_id: Uuid, draft: ArtifactDraft) -> Result<ArtifactInfo> {
        let _guard = self.transitions.lock().await;
        let message = self.get_message(message_id).await?;
        if message.artifact().is_some() {
            return Err(ScribeError::Conflict(format!(
                "message {} already holds an artifact",
                message_id
            )));
        }

        let artifact = draft.into_pending();
        let metadata = message
            .metadata
            .unwrap_or_default()
            .with_artifact(artifact.clone());
        self.write_metadata(message_id, metadata).await?;

        tracing::debug!(message_id = %message_id, artifact_id = %artifact.id, "Attached artifact");
        Ok(artifact)
    }

    /// pending → accepted
    pub async fn accept(&self, message_id: Uuid, feedback: Option<String>) -> Result<ChatMessage> {
        self.transition(message_id, ArtifactStatus::Accepted, |action| {
            action.feedback = feedback;
        })
        .await
    }

    /// pending → rejected
    pub async fn reject(&self, message_id: Uuid, reason: Option<String>) -> Result<ChatMessage> {
        self.transition(message_id, ArtifactStatus::Rejected, |action| {
            action.reason = reason;
        })
        .await
    }

    /// accepted → applied; the artifact content replaces the article's document.
    pub async fn apply(&self, message_id: Uuid) -> Result<ChatMessage> {
        self.transition(message_id, ArtifactStatus::Applied, |_| {}).await
    }

    /// Messages with a pending artifact, newest first.
    pub async fn get_pending(&self, article_id: &str) -> Result<Vec<ChatMessage>> {
        self.messages.pending_artifacts(article_id).await
    }

    pub async fn get_message(&self, message_id: Uuid) -> Result<ChatMessage> {
        self.messages
            .get(message_id)
            .await?
            .ok_or_else(|| ScribeError::NotFound(format!("message {}", message_id)))
    }

    pub async fn get_artifact_content(&self, message_id: Uuid) -> Result<String> {
        let message = self.get_message(message_id).await?;
        message
            .artifact()
            .map(|artifact| artifact.content.clone())
            .ok_or_else(|| ScribeError::NotFound(format!("artifact on message {}", message_id)))
    }

    /// Replace a message's metadata after validating it.
    pub async fn update_metadata(&self, message_id: Uuid, metadata: MessageMetaData) -> Result<()> {
        let _guard = self.transitions.lock().await;
        self.write_metadata(message_id, metadata).await
    }

    /// Conversation for an article, oldest first.
    ///
    /// `limit` defaults to 50 and is capped at 200. An empty conversation is
    /// seeded with a greeting from the assistant.
    pub async fn history(&self, article_id: &str, limit: Option<usize>) -> Result<Vec<ChatMessage>> {
        let limit = match limit {
            Some(0) | None => DEFAULT_HISTORY_LIMIT,
            Some(n) => n.min(MAX_HISTORY_LIMIT),
        };

        let mut messages = self.messages.recent(article_id, limit).await?;
        messages.reverse();

        if messages.is_empty() {
            let greeting = ChatMessage::assistant(article_id, INITIAL_GREETING);
            let greeting = match self.messages.create(greeting.clone()).await {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::warn!(article_id, "Failed to save initial greeting: {}", e);
                    greeting
                }
            };
            return Ok(vec![greeting]);
        }

        Ok(messages)
    }

    /// Delete the whole conversation of an article.
    pub async fn clear_history(&self, article_id: &str) -> Result<usize> {
        let removed = self.messages.delete_by_article(article_id).await?;
        tracing::info!(article_id, removed, "Cleared conversation history");
        Ok(removed)
    }

    async fn transition<F>(&self, message_id: Uuid, next: ArtifactStatus, annotate: F) -> Result<ChatMessage>
    where
        F: FnOnce(&mut UserAction),
    {
        let _guard = self.transitions.lock().await;
        let message = self.get_message(message_id).await?;
        let mut metadata = message.metadata.clone().unwrap_or_default();
        let artifact = metadata
            .artifact
            .as_mut()
            .ok_or_else(|| ScribeError::NotFound(format!("artifact on message {}", message_id)))?;

        if !artifact.status.can_transition_to(next) {
            return Err(ScribeError::Conflict(format!(
                "artifact {} is {} and cannot become {}",
                artifact.id, artifact.status, next
            )));
        }

        match next {
            ArtifactStatus::Applied => {
                self.documents
                    .update(&message.article_id, &artifact.content)
                    .await?;
                artifact.applied_at = Some(Utc::now());
            }
            ArtifactStatus::Accepted | ArtifactStatus::Rejected => {
                let kind = if next == ArtifactStatus::Accepted {
                    UserActionKind::Accept
                } else {
                    UserActionKind::Reject
                };
                let mut action = UserAction::new(kind, artifact.id.clone());
                annotate(&mut action);
                metadata.user_action = Some(action);
            }
            ArtifactStatus::Pending => {}
        }

        if let Some(artifact) = metadata.artifact.as_mut() {
            artifact.status = next;
            tracing::info!(message_id = %message_id, artifact_id = %artifact.id, status = %next, "Artifact transitioned");
        }

        self.write_metadata(message_id, metadata).await?;
        self.get_message(message_id).await
    }

    async fn write_metadata(&self, message_id: Uuid, metadata: MessageMetaData) -> Result<()> {
        validate_metadata(&metadata)?;
        if !self.messages.update_metadata(message_id, metadata).await? {
            return Err(ScribeError::NotFound(format!("message {}", message_id)));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ArtifactService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ArtifactType;

    struct Fixture {
        service: ArtifactService,
        messages: Arc<InMemoryMessageStore>,
        documents: Arc<InMemoryDocumentStore>,
    }

    fn fixture() -> Fixture {
        let messages = Arc::new(InMemoryMessageStore::new());
        let documents = Arc::new(InMemoryDocumentStore::new().with_document("article", "Cats are animals."));
        Fixture {
            service: ArtifactService::new(messages.clone(), documents.clone()),
            messages,
            documents,
        }
    }

    async fn message_with_artifact(f: &Fixture) -> Uuid {
        let message = f
            .messages
            .create(ChatMessage::assistant("article", "edit_text: punchier intro"))
            .await
            .unwrap();
        f.service
            .attach_artifact(message.id, ArtifactDraft::new(ArtifactType::CodeEdit, "Cats rule."))
            .await
            .unwrap();
        message.id
    }

    #[tokio::test]
    async fn test_accept_then_apply() {
        let f = fixture();
        let id = message_with_artifact(&f).await;

        let accepted = f.service.accept(id, Some("good".to_string())).await.unwrap();
        let artifact = accepted.artifact().unwrap();
        assert_eq!(artifact.status, ArtifactStatus::Accepted);
        let action = accepted.metadata.as_ref().unwrap().user_action.as_ref().unwrap();
        assert_eq!(action.action, UserActionKind::Accept);
        assert_eq!(action.feedback.as_deref(), Some("good"));
        assert_eq!(action.artifact_id, artifact.id);

        let applied = f.service.apply(id).await.unwrap();
        assert_eq!(applied.artifact().unwrap().status, ArtifactStatus::Applied);
        assert!(applied.artifact().unwrap().applied_at.is_some());
        assert_eq!(
            f.documents.get("article").await.unwrap().as_deref(),
            Some("Cats rule.")
        );
    }

    #[tokio::test]
    async fn test_create_artifact_message_saves_pending_artifact() {
        let f = fixture();
        let created = f
            .service
            .create_artifact_message(
                ChatMessage::assistant("article", "generate_text_content: intro"),
                ArtifactDraft::new(ArtifactType::ContentGeneration, "Cats nap."),
            )
            .await
            .unwrap();

        assert_eq!(created.artifact().unwrap().status, ArtifactStatus::Pending);
        let pending = f.service.get_pending("article").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, created.id);
        assert_eq!(f.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_reject_records_reason() {
        let f = fixture();
        let id = message_with_artifact(&f).await;

        let rejected = f.service.reject(id, Some("too long".to_string())).await.unwrap();
        assert_eq!(rejected.artifact().unwrap().status, ArtifactStatus::Rejected);
        let action = rejected.metadata.unwrap().user_action.unwrap();
        assert_eq!(action.action, UserActionKind::Reject);
        assert_eq!(action.reason.as_deref(), Some("too long"));
    }

    #[tokio::test]
    async fn test_invalid_transitions_conflict() {
        let f = fixture();
        let id = message_with_artifact(&f).await;

        assert!(matches!(f.service.apply(id).await, Err(ScribeError::Conflict(_))));

        f.service.accept(id, None).await.unwrap();
        assert!(matches!(f.service.reject(id, None).await, Err(ScribeError::Conflict(_))));
        assert!(matches!(f.service.accept(id, None).await, Err(ScribeError::Conflict(_))));

        f.service.apply(id).await.unwrap();
        assert!(matches!(f.service.apply(id).await, Err(ScribeError::Conflict(_))));
        assert!(matches!(f.service.reject(id, None).await, Err(ScribeError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rejected_is_terminal() {
        let f = fixture();
        let id = message_with_artifact(&f).await;
        f.service.reject(id, None).await.unwrap();
        assert!(matches!(f.service.accept(id, None).await, Err(ScribeError::Conflict(_))));
        assert!(matches!(f.service.apply(id).await, Err(ScribeError::Conflict(_))));
        assert_eq!(
            f.documents.get("article").await.unwrap().as_deref(),
            Some("Cats are animals.")
        );
    }

    #[tokio::test]
    async fn test_unknown_message_and_missing_artifact() {
        let f = fixture();
        assert!(matches!(
            f.service.accept(Uuid::new_v4(), None).await,
            Err(ScribeError::NotFound(_))
        ));

        let plain = f.messages.create(ChatMessage::user("article", "hi")).await.unwrap();
        assert!(matches!(f.service.accept(plain.id, None).await, Err(ScribeError::NotFound(_))));
        assert!(matches!(
            f.service.get_artifact_content(plain.id).await,
            Err(ScribeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_second_artifact_on_message_conflicts() {
        let f = fixture();
        let id = message_with_artifact(&f).await;
        let err = f
            .service
            .attach_artifact(id, ArtifactDraft::new(ArtifactType::Suggestion, "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_pending_and_content() {
        let f = fixture();
        let first = message_with_artifact(&f).await;
        let second = message_with_artifact(&f).await;
        f.service.reject(first, None).await.unwrap();

        let pending = f.service.get_pending("article").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
        assert_eq!(f.service.get_artifact_content(second).await.unwrap(), "Cats rule.");
    }

    #[tokio::test]
    async fn test_history_greets_empty_article() {
        let f = fixture();
        let history = f.service.history("fresh", None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, INITIAL_GREETING);

        // The greeting is persisted, so it is not created twice.
        let again = f.service.history("fresh", None).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, history[0].id);
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_and_capped() {
        let f = fixture();
        for i in 0..250 {
            f.messages
                .create(ChatMessage::user("long", format!("{}", i)))
                .await
                .unwrap();
        }

        let history = f.service.history("long", Some(1000)).await.unwrap();
        assert_eq!(history.len(), MAX_HISTORY_LIMIT);
        assert_eq!(history.first().unwrap().content, "50");
        assert_eq!(history.last().unwrap().content, "249");

        let default = f.service.history("long", None).await.unwrap();
        assert_eq!(default.len(), DEFAULT_HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let f = fixture();
        message_with_artifact(&f).await;
        assert_eq!(f.service.clear_history("article").await.unwrap(), 1);
        assert!(f.messages.is_empty());
    }

    #[tokio::test]
    async fn test_update_metadata_validates() {
        let f = fixture();
        let id = message_with_artifact(&f).await;
        let mut metadata = f.service.get_message(id).await.unwrap().metadata.unwrap();
        metadata.artifact.as_mut().unwrap().id = String::new();

        let err = f.service.update_metadata(id, metadata).await.unwrap_err();
        assert!(matches!(err, ScribeError::InvalidInput(_)));
    }
}
