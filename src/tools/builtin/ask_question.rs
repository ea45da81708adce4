// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Question answering tool
//!
//! Asks the web answer service a direct question and returns the answer
//! with the pages it cites.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{Result, ScribeError};
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, Citation, SchemaBuilder, Tool, ToolContext, ToolResult, WebSearch};

const NAME: &str = "ask_question";

/// Characters of cited page text shown per citation
const CITATION_PREVIEW_CHARS: usize = 300;

/// Tool for answering a factual question from the web
pub struct AskQuestionTool {
    web: Option<Arc<dyn WebSearch>>,
}

impl AskQuestionTool {
    pub fn new(web: Option<Arc<dyn WebSearch>>) -> Self {
        Self { web }
    }
}

fn citation_entry(citation: &Citation) -> Value {
    let mut entry = json!({
        "url": citation.url,
        "title": citation.title,
    });
    if let Some(author) = &citation.author {
        entry["author"] = json!(author);
    }
    if let Some(date) = &citation.published_date {
        entry["published_date"] = json!(date);
    }
    if let Some(favicon) = &citation.favicon {
        entry["favicon"] = json!(favicon);
    }
    if let Some(text) = citation.text.as_deref().filter(|t| !t.is_empty()) {
        let mut preview: String = text.chars().take(CITATION_PREVIEW_CHARS).collect();
        if text.chars().count() > CITATION_PREVIEW_CHARS {
            preview.push_str("...");
        }
        entry["text_preview"] = json!(preview);
    }
    entry
}

#[async_trait]
impl Tool for AskQuestionTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Get a direct answer to a factual question, with citations to the web pages it \
                          came from. Use for specific facts, figures and recent events."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("question", "The question to answer", true)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, _context: &ToolContext) -> Result<ToolResult> {
        let question = required_str(&input, "question")?;
        let web = self.web.as_ref().ok_or_else(|| {
            ScribeError::Collaborator(
                "Answer service is not configured. Set EXA_API_KEY to enable it.".to_string(),
            )
        })?;

        let answer = web
            .answer(question)
            .await
            .map_err(|e| ScribeError::ToolExecution(format!("Failed to answer question: {}", e)))?;

        tracing::info!(question, citations = answer.citations.len(), "Question answered");

        let mut output = json!({
            "answer": answer.answer,
            "citations": answer.citations.iter().map(citation_entry).collect::<Vec<_>>(),
            "question": question,
            "citation_count": answer.citations.len(),
            "tool_name": NAME,
        });
        if let Some(cost) = answer.cost_dollars {
            output["cost_info"] = cost;
        }
        Ok(ToolResult::json(tool_use_id, &output).with_metadata(output).searching())
    }
}
