// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! External services the built-in tools call into
//!
//! Each one is optional; a tool whose service is missing reports a failed
//! result instead of panicking.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, ScribeError};
use crate::llm::message::Message;
use crate::llm::provider::{CompletionRequest, LlmProvider};

/// A research source attached to an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub article_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub content: String,
    pub source_type: String,
}

/// One hit from a web search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A page an answer was drawn from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A direct answer to a question, with the pages backing it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebAnswer {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_dollars: Option<Value>,
}

/// Similarity search over an article's sources
#[async_trait]
pub trait SourceSearch: Send + Sync {
    async fn search_similar(&self, article_id: &str, query: &str, limit: usize) -> Result<Vec<Source>>;
}

/// Web search backend
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<WebSearchResult>>;

    /// Answer a question from web pages. Backends without an answer
    /// endpoint report a collaborator error.
    async fn answer(&self, question: &str) -> Result<WebAnswer> {
        let _ = question;
        Err(ScribeError::Collaborator(
            "this search backend does not answer questions".to_string(),
        ))
    }
}

/// Turns a web result into a stored source
#[async_trait]
pub trait SourceImporter: Send + Sync {
    async fn import(&self, article_id: &str, query: &str, result: &WebSearchResult) -> Result<Source>;
}

/// Free-form text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_image_prompt(&self, content: &str) -> Result<String>;

    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// Services handed to [`super::ToolRegistry::with_builtins`]
#[derive(Clone, Default)]
pub struct ToolServices {
    pub sources: Option<Arc<dyn SourceSearch>>,
    pub web: Option<Arc<dyn WebSearch>>,
    pub importer: Option<Arc<dyn SourceImporter>>,
    pub text: Option<Arc<dyn TextGenerator>>,
}

impl ToolServices {
    pub fn with_sources(mut self, sources: Arc<dyn SourceSearch>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_web(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn with_importer(mut self, importer: Arc<dyn SourceImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn with_text(mut self, text: Arc<dyn TextGenerator>) -> Self {
        self.text = Some(text);
        self
    }
}

impl std::fmt::Debug for ToolServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServices")
            .field("sources", &self.sources.is_some())
            .field("web", &self.web.is_some())
            .field("importer", &self.importer.is_some())
            .field("text", &self.text.is_some())
            .finish()
    }
}

/// Process-local source library.
///
/// Implements both search (every source of the article, in insertion order)
/// and import, so web results imported here become searchable.
#[derive(Debug, Default)]
pub struct InMemorySources {
    sources: DashMap<String, Vec<Source>>,
}

impl InMemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source: Source) {
        self.sources
            .entry(source.article_id.clone())
            .or_default()
            .push(source);
    }

    pub fn count(&self, article_id: &str) -> usize {
        self.sources.get(article_id).map_or(0, |s| s.len())
    }
}

#[async_trait]
impl SourceSearch for InMemorySources {
    async fn search_similar(&self, article_id: &str, _query: &str, limit: usize) -> Result<Vec<Source>> {
        Ok(self
            .sources
            .get(article_id)
            .map(|sources| sources.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceImporter for InMemorySources {
    async fn import(&self, article_id: &str, _query: &str, result: &WebSearchResult) -> Result<Source> {
        let source = Source {
            id: Uuid::new_v4().to_string(),
            article_id: article_id.to_string(),
            title: result.title.clone(),
            url: Some(result.url.clone()),
            content: result.text.clone().unwrap_or_default(),
            source_type: "web_search".to_string(),
        };
        self.add(source.clone());
        Ok(source)
    }
}

const GENERATED_TEXT_MAX_TOKENS: u32 = 2000;

/// Image prompts and article text written by a chat model
pub struct LlmTextGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmTextGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate_image_prompt(&self, content: &str) -> Result<String> {
        let request = CompletionRequest::new(self.model.clone(), vec![Message::user(content)])
            .with_system(
                "Write a single prompt for an image generator that illustrates the given text. \
                 Describe subject, setting, composition and style in one paragraph. \
                 Reply with the prompt only.",
            )
            .with_max_tokens(300);
        let response = self.provider.complete(request).await?;
        Ok(response.text().trim().to_string())
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_system(
                "You write article content. Follow the request, draw on any context sources \
                 given, and keep the voice of any original content. Reply with the content only.",
            )
            .with_max_tokens(GENERATED_TEXT_MAX_TOKENS);
        let response = self.provider.complete(request).await?;
        Ok(response.text().trim().to_string())
    }
}
