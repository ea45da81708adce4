// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Proposed document edits
//!
//! Tools produce [`ArtifactDraft`]s; once attached to a message they follow
//! the pending → accepted → applied (or pending → rejected) lifecycle
//! managed by [`ArtifactService`].

pub mod documents;
pub mod service;

pub use documents::{DocumentStore, InMemoryDocumentStore};
pub use service::{ArtifactService, DEFAULT_HISTORY_LIMIT, INITIAL_GREETING, MAX_HISTORY_LIMIT};

use serde::{Deserialize, Serialize};

use crate::conversation::{ArtifactInfo, ArtifactType};

/// An artifact as produced by a tool, before it is attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDraft {
    pub artifact_type: ArtifactType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_preview: Option<String>,
}

impl ArtifactDraft {
    pub fn new(artifact_type: ArtifactType, content: impl Into<String>) -> Self {
        Self {
            artifact_type,
            content: content.into(),
            title: None,
            description: None,
            diff_preview: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_diff_preview(mut self, preview: impl Into<String>) -> Self {
        let preview = preview.into();
        self.diff_preview = (!preview.is_empty()).then_some(preview);
        self
    }

    /// Turn the draft into a pending artifact with a fresh id.
    pub fn into_pending(self) -> ArtifactInfo {
        let mut info = ArtifactInfo::pending(self.artifact_type, self.content);
        info.title = self.title;
        info.description = self.description;
        info.diff_preview = self.diff_preview;
        info
    }
}
