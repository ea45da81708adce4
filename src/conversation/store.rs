// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message persistence
//!
//! `MessageStore` is the seam to whatever database holds conversations.
//! `InMemoryMessageStore` backs tests and the CLI.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use super::message::ChatMessage;
use super::metadata::{ArtifactStatus, MessageMetaData};
use crate::error::Result;

/// Storage for conversation messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message.
    async fn create(&self, message: ChatMessage) -> Result<ChatMessage>;

    async fn get(&self, id: Uuid) -> Result<Option<ChatMessage>>;

    /// The `limit` most recent messages of an article, newest first.
    async fn recent(&self, article_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Replace a message's metadata. Returns false if the message is unknown.
    async fn update_metadata(&self, id: Uuid, metadata: MessageMetaData) -> Result<bool>;

    /// Delete every message of an article, returning how many were removed.
    async fn delete_by_article(&self, article_id: &str) -> Result<usize>;

    /// Messages of an article whose artifact is pending, newest first.
    async fn pending_artifacts(&self, article_id: &str) -> Result<Vec<ChatMessage>>;
}

/// Process-local message store
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: DashMap<Uuid, (u64, ChatMessage)>,
    sequence: AtomicU64,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn newest_first<F>(&self, filter: F) -> Vec<ChatMessage>
    where
        F: Fn(&ChatMessage) -> bool,
    {
        let mut matching: Vec<(u64, ChatMessage)> = self
            .messages
            .iter()
            .filter(|entry| filter(&entry.value().1))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));
        matching.into_iter().map(|(_, message)| message).collect()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(&self, message: ChatMessage) -> Result<ChatMessage> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.messages.insert(message.id, (seq, message.clone()));
        Ok(message)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        Ok(self.messages.get(&id).map(|entry| entry.value().1.clone()))
    }

    async fn recent(&self, article_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let mut messages = self.newest_first(|m| m.article_id == article_id);
        messages.truncate(limit);
        Ok(messages)
    }

    async fn update_metadata(&self, id: Uuid, metadata: MessageMetaData) -> Result<bool> {
        match self.messages.get_mut(&id) {
            Some(mut entry) => {
                entry.value_mut().1.metadata = Some(metadata);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_article(&self, article_id: &str) -> Result<usize> {
        let mut removed = 0;
        self.messages.retain(|_, (_, message)| {
            let keep = message.article_id != article_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn pending_artifacts(&self, article_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self.newest_first(|m| {
            m.article_id == article_id
                && m.artifact()
                    .is_some_and(|a| a.status == ArtifactStatus::Pending)
        }))
    }
}
