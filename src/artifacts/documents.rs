// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Document persistence

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

/// Where applied artifacts land
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, article_id: &str) -> Result<Option<String>>;

    /// Replace the article's content.
    async fn update(&self, article_id: &str, content: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<String, String>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, article_id: impl Into<String>, content: impl Into<String>) -> Self {
        self.documents.insert(article_id.into(), content.into());
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, article_id: &str) -> Result<Option<String>> {
        Ok(self.documents.get(article_id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, article_id: &str, content: &str) -> Result<()> {
        self.documents
            .insert(article_id.to_string(), content.to_string());
        Ok(())
    }
}
