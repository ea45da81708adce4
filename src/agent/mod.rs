// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Writing agent
//!
//! One [`ChatRequest`] drives one run of the tool-calling loop in
//! [`runner::AgentRunner`].

pub mod prompt;
pub mod runner;

pub use runner::{AgentRunner, EventSink, RunContext};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};

/// A writing request against one article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_content: Option<String>,
    pub article_id: String,
    /// Model override; the configured default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(article_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            document_content: None,
            article_id: article_id.into(),
            model: None,
        }
    }

    pub fn with_document(mut self, content: impl Into<String>) -> Self {
        self.document_content = Some(content.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Reject requests without a message or article.
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(ScribeError::InvalidInput("message cannot be empty".to_string()));
        }
        if self.article_id.trim().is_empty() {
            return Err(ScribeError::InvalidInput("article_id cannot be empty".to_string()));
        }
        Ok(())
    }

    /// The attached document, when it has any content.
    pub fn document(&self) -> Option<&str> {
        self.document_content.as_deref().filter(|d| !d.is_empty())
    }
}
