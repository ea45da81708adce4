// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Web search tool
//!
//! Searches the web and imports usable results as sources for the article.
//! A failed import is counted and skipped; it never fails the search.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{Result, ScribeError};
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, SourceImporter, Tool, ToolContext, ToolResult, WebSearch, WebSearchResult};

const NAME: &str = "search_web_sources";

/// Characters of page text shown per result
const TEXT_PREVIEW_CHARS: usize = 500;

/// Hosts whose pages rarely make good sources. Subdomains match too.
const SKIP_HOSTS: &[&str] = &["twitter.com", "x.com", "facebook.com", "instagram.com", "tiktok.com"];

/// Host and path prefix pairs to skip
const SKIP_HOST_PATHS: &[(&str, &str)] = &[
    ("linkedin.com", "/feed"),
    ("youtube.com", "/shorts"),
    ("reddit.com", "/r/"),
];

/// Substrings that mark search, login and signup pages
const SKIP_PATTERNS: &[&str] = &["/search?", "/login", "/signup", "/register"];

/// Tool for searching the web and importing results as sources
pub struct SearchWebSourcesTool {
    web: Option<Arc<dyn WebSearch>>,
    importer: Option<Arc<dyn SourceImporter>>,
}

impl SearchWebSourcesTool {
    pub fn new(web: Option<Arc<dyn WebSearch>>, importer: Option<Arc<dyn SourceImporter>>) -> Self {
        Self { web, importer }
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.strip_suffix(domain).is_some_and(|prefix| prefix.ends_with('.'))
}

/// Whether a result URL should not be imported.
pub fn should_skip_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let Ok(parsed) = Url::parse(&lower) else {
        return true;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return true;
    }
    let Some(host) = parsed.host_str() else {
        return true;
    };

    if SKIP_HOSTS.iter().any(|domain| host_matches(host, domain)) {
        return true;
    }
    if SKIP_HOST_PATHS
        .iter()
        .any(|(domain, path)| host_matches(host, domain) && parsed.path().starts_with(path))
    {
        return true;
    }
    SKIP_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

fn result_entry(result: &WebSearchResult) -> Value {
    let mut entry = json!({
        "title": result.title,
        "url": result.url,
        "id": result.id,
        "published_date": result.published_date,
        "author": result.author,
        "summary": result.summary,
        "has_full_text": result.text.as_deref().is_some_and(|t| !t.is_empty()),
    });
    if let Some(text) = result.text.as_deref().filter(|t| !t.is_empty()) {
        let mut preview: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
        if text.chars().count() > TEXT_PREVIEW_CHARS {
            preview.push_str("...");
        }
        entry["text_preview"] = json!(preview);
        entry["text_length"] = json!(text.chars().count());
    }
    entry
}

#[async_trait]
impl Tool for SearchWebSourcesTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Search the web for recent, high quality content on a topic and add the results to \
                          the article's sources."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("query", "What to search the web for", true)
                .boolean("create_sources", "Import results as article sources (default: true)", false)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, context: &ToolContext) -> Result<ToolResult> {
        let query = required_str(&input, "query")?;
        let mut create_sources = input["create_sources"].as_bool().unwrap_or(true);

        let web = self.web.as_ref().ok_or_else(|| {
            ScribeError::Collaborator("Web search is not configured. Set EXA_API_KEY to enable it.".to_string())
        })?;

        if create_sources && context.article_id.is_none() {
            tracing::warn!("No article ID in context, search results will not be imported");
            create_sources = false;
        }

        let results = web
            .search(query)
            .await
            .map_err(|e| ScribeError::ToolExecution(format!("Failed to search web: {}", e)))?;

        if results.is_empty() {
            let output = json!({
                "results": [],
                "sources_created": [],
                "query": query,
                "total_found": 0,
                "sources_attempted": 0,
                "sources_successful": 0,
                "tool_name": NAME,
                "message": "No results found for the search query",
            });
            return Ok(ToolResult::json(tool_use_id, &output).with_metadata(output).searching());
        }

        let mut entries = Vec::with_capacity(results.len());
        let mut created = Vec::new();
        let mut attempted = 0usize;
        let mut skipped = 0usize;

        for result in &results {
            entries.push(result_entry(result));

            let (Some(importer), Some(article_id)) = (self.importer.as_ref(), context.article_id.as_deref()) else {
                continue;
            };
            if !create_sources {
                continue;
            }
            if should_skip_url(&result.url) {
                tracing::debug!(url = %result.url, "Skipping denylisted URL");
                skipped += 1;
                continue;
            }
            if !result.text.as_deref().is_some_and(|t| !t.is_empty()) {
                tracing::debug!(url = %result.url, "Skipping result without page text");
                skipped += 1;
                continue;
            }

            attempted += 1;
            match importer.import(article_id, query, result).await {
                Ok(source) => created.push(json!({
                    "source_id": source.id,
                    "original_title": result.title,
                    "original_url": result.url,
                    "source_created": true,
                })),
                Err(e) => tracing::warn!(url = %result.url, error = %e, "Failed to import search result"),
            }
        }

        let successful = created.len();
        let mut message = format!("Found {} search results", entries.len());
        if create_sources {
            if successful > 0 {
                message.push_str(&format!(" and successfully created {} sources", successful));
            } else if attempted > 0 {
                message.push_str(" but failed to create any sources");
            } else {
                message.push_str(" but source creation was skipped");
            }
        }

        tracing::info!(
            query,
            found = results.len(),
            attempted,
            successful,
            skipped,
            "Web search finished"
        );

        let output = json!({
            "results": entries,
            "sources_created": created,
            "query": query,
            "total_found": results.len(),
            "sources_attempted": attempted,
            "sources_successful": successful,
            "sources_skipped": skipped,
            "tool_name": NAME,
            "message": message,
        });
        Ok(ToolResult::json(tool_use_id, &output).with_metadata(output).searching())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{InMemorySources, Source};
    use uuid::Uuid;

    struct FixedSearch(Vec<WebSearchResult>);

    #[async_trait]
    impl WebSearch for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<WebSearchResult>> {
            Ok(self.0.clone())
        }
    }

    struct RejectingImporter;

    #[async_trait]
    impl SourceImporter for RejectingImporter {
        async fn import(&self, _article_id: &str, _query: &str, result: &WebSearchResult) -> Result<Source> {
            Err(ScribeError::Collaborator(format!("could not scrape {}", result.url)))
        }
    }

    fn hit(url: &str, text: Option<&str>) -> WebSearchResult {
        WebSearchResult {
            title: format!("Page at {}", url),
            url: url.to_string(),
            text: text.map(str::to_string),
            ..Default::default()
        }
    }

    fn context() -> ToolContext {
        ToolContext::new(Uuid::new_v4(), Uuid::new_v4()).with_article("article-1")
    }

    fn output(result: &ToolResult) -> Value {
        serde_json::from_str(result.output_text()).unwrap()
    }

    #[test]
    fn test_should_skip_url() {
        assert!(should_skip_url("https://twitter.com/someone/status/1"));
        assert!(should_skip_url("https://mobile.x.com/post"));
        assert!(should_skip_url("https://www.youtube.com/shorts/abc"));
        assert!(should_skip_url("https://www.reddit.com/r/cats/comments/1"));
        assert!(should_skip_url("https://example.com/search?q=cats"));
        assert!(should_skip_url("https://example.com/login"));
        assert!(should_skip_url("mailto:someone@example.com"));
        assert!(should_skip_url("javascript:alert(1)"));
        assert!(should_skip_url("ftp://example.com/file"));
        assert!(should_skip_url("not a url"));

        assert!(!should_skip_url("https://www.netflix.com/title/1"));
        assert!(!should_skip_url("https://www.youtube.com/watch?v=abc"));
        assert!(!should_skip_url("https://www.reddit.com/about"));
        assert!(!should_skip_url("https://en.wikipedia.org/wiki/Cat"));
    }

    #[tokio::test]
    async fn test_imports_usable_results() {
        let library = Arc::new(InMemorySources::new());
        let search = FixedSearch(vec![
            hit("https://en.wikipedia.org/wiki/Cat", Some("The cat is a small carnivore.")),
            hit("https://twitter.com/cats", Some("meow")),
            hit("https://example.com/empty", None),
        ]);
        let tool = SearchWebSourcesTool::new(Some(Arc::new(search)), Some(library.clone()));

        let result = tool
            .execute("t1".to_string(), json!({"query": "cats"}), &context())
            .await
            .unwrap();

        assert!(result.is_search);
        let output = output(&result);
        assert_eq!(output["total_found"], 3);
        assert_eq!(output["sources_attempted"], 1);
        assert_eq!(output["sources_successful"], 1);
        assert_eq!(output["message"], "Found 3 search results and successfully created 1 sources");
        assert_eq!(output["results"][0]["has_full_text"], true);
        assert_eq!(output["results"][2]["has_full_text"], false);
        assert_eq!(library.count("article-1"), 1);
    }

    #[tokio::test]
    async fn test_import_failures_are_counted() {
        let search = FixedSearch(vec![hit("https://example.com/a", Some("text"))]);
        let tool = SearchWebSourcesTool::new(Some(Arc::new(search)), Some(Arc::new(RejectingImporter)));

        let result = tool
            .execute("t1".to_string(), json!({"query": "cats"}), &context())
            .await
            .unwrap();

        let output = output(&result);
        assert_eq!(output["sources_attempted"], 1);
        assert_eq!(output["sources_successful"], 0);
        assert_eq!(output["message"], "Found 1 search results but failed to create any sources");
    }

    #[tokio::test]
    async fn test_create_sources_false_only_searches() {
        let library = Arc::new(InMemorySources::new());
        let search = FixedSearch(vec![hit("https://example.com/a", Some(&"x".repeat(600)))]);
        let tool = SearchWebSourcesTool::new(Some(Arc::new(search)), Some(library.clone()));

        let result = tool
            .execute("t1".to_string(), json!({"query": "cats", "create_sources": false}), &context())
            .await
            .unwrap();

        let output = output(&result);
        assert_eq!(output["message"], "Found 1 search results");
        assert_eq!(output["results"][0]["text_length"], 600);
        assert_eq!(output["results"][0]["text_preview"].as_str().unwrap().len(), 503);
        assert_eq!(library.count("article-1"), 0);
    }

    #[tokio::test]
    async fn test_no_results() {
        let tool = SearchWebSourcesTool::new(Some(Arc::new(FixedSearch(vec![]))), None);
        let result = tool
            .execute("t1".to_string(), json!({"query": "cats"}), &context())
            .await
            .unwrap();
        assert_eq!(output(&result)["message"], "No results found for the search query");
    }

    #[tokio::test]
    async fn test_unconfigured_search_is_error() {
        let tool = SearchWebSourcesTool::new(None, None);
        assert!(tool
            .execute("t1".to_string(), json!({"query": "cats"}), &context())
            .await
            .is_err());
    }
}
