// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Exa search API client
//!
//! Implements [`WebSearch`] on top of Exa's `/search` endpoint, asking for
//! page text and a summary with every hit. Questions go to `/answer`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::{ApiError, Result, ScribeError};
use crate::tools::{Citation, WebAnswer, WebSearch, WebSearchResult};

/// Exa web search client
pub struct ExaSearchClient {
    client: Client,
    api_key: String,
    base_url: String,
    num_results: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    search_type: &'static str,
    num_results: u32,
    use_autoprompt: bool,
    contents: SearchContents,
}

#[derive(Debug, Serialize)]
struct SearchContents {
    text: bool,
    summary: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    query: &'a str,
    text: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerResponse {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    citations: Vec<ExaCitation>,
    #[serde(default)]
    cost_dollars: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaCitation {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    favicon: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl From<ExaCitation> for Citation {
    fn from(citation: ExaCitation) -> Self {
        Citation {
            title: citation.title.unwrap_or_else(|| citation.url.clone()),
            url: citation.url,
            author: citation.author,
            published_date: citation.published_date,
            favicon: citation.favicon,
            text: citation.text,
        }
    }
}

impl From<ExaResult> for WebSearchResult {
    fn from(result: ExaResult) -> Self {
        WebSearchResult {
            title: result.title.unwrap_or_else(|| result.url.clone()),
            url: result.url,
            id: result.id,
            published_date: result.published_date,
            author: result.author,
            text: result.text,
            summary: result.summary,
        }
    }
}

impl ExaSearchClient {
    /// Create a client with an explicit key and base URL
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            num_results: 6,
        }
    }

    /// Build a client from settings. `None` when no API key is available.
    pub fn from_config(config: &SearchConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.resolve_api_key() else {
            tracing::debug!(env = %config.api_key_env, "No search API key, web search disabled");
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            num_results: config.num_results,
        }))
    }

    pub fn with_num_results(mut self, num_results: u32) -> Self {
        self.num_results = num_results;
        self
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScribeError::Api(ApiError::Timeout)
                } else {
                    ScribeError::Api(ApiError::Network(e.to_string()))
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body, retry_after));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{} response: {}", endpoint, e)).into())
    }

    fn parse_error(status: u16, body: &str, retry_after: Option<u32>) -> ScribeError {
        match status {
            401 | 403 => ApiError::AuthenticationFailed.into(),
            429 => ApiError::RateLimited(retry_after.unwrap_or(60)).into(),
            _ => ApiError::ServerError {
                status,
                message: if body.is_empty() {
                    format!("search API returned status {}", status)
                } else {
                    body.to_string()
                },
            }
            .into(),
        }
    }
}

#[async_trait]
impl WebSearch for ExaSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<WebSearchResult>> {
        if query.trim().is_empty() {
            return Err(ScribeError::InvalidInput("search query cannot be empty".to_string()));
        }

        let body = SearchRequest {
            query,
            search_type: "auto",
            num_results: self.num_results,
            use_autoprompt: true,
            contents: SearchContents {
                text: true,
                summary: true,
            },
        };

        let parsed: SearchResponse = self.post("search", &body).await?;

        tracing::debug!(
            request_id = parsed.request_id.as_deref().unwrap_or_default(),
            results = parsed.results.len(),
            "Exa search completed"
        );

        Ok(parsed.results.into_iter().map(WebSearchResult::from).collect())
    }

    async fn answer(&self, question: &str) -> Result<WebAnswer> {
        if question.trim().is_empty() {
            return Err(ScribeError::InvalidInput("question cannot be empty".to_string()));
        }

        let body = AnswerRequest {
            query: question,
            text: true,
        };
        let parsed: AnswerResponse = self.post("answer", &body).await?;

        tracing::debug!(citations = parsed.citations.len(), "Exa answer completed");

        Ok(WebAnswer {
            answer: parsed.answer,
            citations: parsed.citations.into_iter().map(Citation::from).collect(),
            cost_dollars: parsed.cost_dollars,
        })
    }
}
