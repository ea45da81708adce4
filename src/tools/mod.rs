// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system
//!
//! Tools are what the model calls to act on the document: edit it, rewrite
//! it, analyze it, or find sources for it. Every tool exposes a schema and
//! an `execute` entry point; failures that the model can correct come back
//! as error results rather than `Err`.

pub mod builtin;
pub mod chunking;
pub mod collaborators;
pub mod definition;
pub mod executor;

pub use collaborators::*;
pub use definition::*;
pub use executor::*;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::artifacts::ArtifactDraft;
use crate::error::Result;
use crate::llm::provider::ToolDefinition;

/// Context provided to tools during execution
#[derive(Clone)]
pub struct ToolContext {
    pub request_id: Uuid,
    pub session_id: Uuid,
    pub article_id: Option<String>,
    /// Current document text, shared so edits are visible to later calls
    document: Arc<RwLock<Option<String>>>,
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("request_id", &self.request_id)
            .field("session_id", &self.session_id)
            .field("article_id", &self.article_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ToolContext {
    pub fn new(request_id: Uuid, session_id: Uuid) -> Self {
        Self {
            request_id,
            session_id,
            article_id: None,
            document: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_article(mut self, article_id: impl Into<String>) -> Self {
        let article_id = article_id.into();
        self.article_id = (!article_id.trim().is_empty()).then_some(article_id);
        self
    }

    pub fn with_document(mut self, document: Option<String>) -> Self {
        self.document = Arc::new(RwLock::new(document.filter(|d| !d.is_empty())));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Snapshot of the current document.
    pub async fn document(&self) -> Option<String> {
        self.document.read().await.clone()
    }

    /// Replace the document for later tool calls in the same request.
    pub async fn set_document(&self, content: String) {
        *self.document.write().await = Some(content);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Result of tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The tool_use_id this result corresponds to
    pub tool_use_id: String,
    pub output: ToolOutput,
    /// Proposed edit, if the tool produced one
    pub artifact: Option<ArtifactDraft>,
    /// Structured data forwarded to the client alongside the text output
    pub metadata: Option<Value>,
    /// Result came from a web search
    pub is_search: bool,
}

/// Output from a tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Success(String),
    Error(String),
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            output: ToolOutput::Success(output.into()),
            artifact: None,
            metadata: None,
            is_search: false,
        }
    }

    /// Successful result whose output is the JSON rendering of `value`.
    pub fn json(tool_use_id: impl Into<String>, value: &Value) -> Self {
        Self::success(tool_use_id, value.to_string())
    }

    pub fn error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            output: ToolOutput::Error(error.into()),
            artifact: None,
            metadata: None,
            is_search: false,
        }
    }

    pub fn with_artifact(mut self, artifact: ArtifactDraft) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn searching(mut self) -> Self {
        self.is_search = true;
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error(_))
    }

    pub fn output_text(&self) -> &str {
        match &self.output {
            ToolOutput::Success(s) => s,
            ToolOutput::Error(s) => s,
        }
    }
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool definition for the LLM
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, tool_use_id: String, input: Value, context: &ToolContext) -> Result<ToolResult>;

    fn name(&self) -> &str;
}

/// Ordered set of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The writing-assistant tool set.
    pub fn with_builtins(services: ToolServices) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(builtin::ReadDocumentTool));
        registry.register(Arc::new(builtin::EditTextTool));
        registry.register(Arc::new(builtin::RewriteDocumentTool::new(services.sources.clone())));
        registry.register(Arc::new(builtin::AnalyzeDocumentTool));
        registry.register(Arc::new(builtin::GenerateImagePromptTool::new(services.text.clone())));
        registry.register(Arc::new(builtin::GenerateTextContentTool::new(services.text.clone())));
        registry.register(Arc::new(builtin::RelevantSourcesTool::new(services.sources.clone())));
        registry.register(Arc::new(builtin::SearchWebSourcesTool::new(
            services.web.clone(),
            services.importer.clone(),
        )));
        registry.register(Arc::new(builtin::AskQuestionTool::new(services.web.clone())));

        registry
    }

    /// Register a tool, replacing any tool with the same name in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_order() {
        let registry = ToolRegistry::with_builtins(ToolServices::default());
        assert_eq!(
            registry.names(),
            vec![
                "read_document",
                "edit_text",
                "rewrite_document",
                "analyze_document",
                "generate_image_prompt",
                "generate_text_content",
                "get_relevant_sources",
                "search_web_sources",
                "ask_question",
            ]
        );
        assert_eq!(registry.definitions().len(), 9);
        assert!(registry.get("edit_text").is_some());
        assert!(registry.get("shell").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::with_builtins(ToolServices::default());
        registry.register(Arc::new(builtin::AnalyzeDocumentTool));
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.names()[3], "analyze_document");
    }

    #[tokio::test]
    async fn test_context_document_is_shared_between_clones() {
        let context = ToolContext::new(Uuid::new_v4(), Uuid::new_v4())
            .with_article("article")
            .with_document(Some("v1".to_string()));
        let clone = context.clone();

        clone.set_document("v2".to_string()).await;
        assert_eq!(context.document().await.as_deref(), Some("v2"));
    }

    #[test]
    fn test_context_blank_article_and_empty_document() {
        let context = ToolContext::new(Uuid::new_v4(), Uuid::new_v4())
            .with_article("  ")
            .with_document(Some(String::new()));
        assert!(context.article_id.is_none());
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        assert!(rt.block_on(context.document()).is_none());
    }

    #[test]
    fn test_tool_result_builders() {
        let result = ToolResult::json("t1", &serde_json::json!({"ok": true}))
            .with_metadata(serde_json::json!({"results": 3}))
            .searching();
        assert!(!result.is_error());
        assert!(result.is_search);
        assert_eq!(result.output_text(), r#"{"ok":true}"#);

        let failed = ToolResult::error("t2", "Unknown tool: shell");
        assert!(failed.is_error());
        assert_eq!(failed.output_text(), "Unknown tool: shell");
    }
}
