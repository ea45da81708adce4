// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in writing tools

mod analyze_document;
mod ask_question;
mod edit_text;
mod generate_image_prompt;
mod generate_text_content;
mod read_document;
mod relevant_sources;
mod rewrite_document;
mod search_web_sources;

pub use analyze_document::AnalyzeDocumentTool;
pub use ask_question::AskQuestionTool;
pub use edit_text::EditTextTool;
pub use generate_image_prompt::GenerateImagePromptTool;
pub use generate_text_content::GenerateTextContentTool;
pub use read_document::ReadDocumentTool;
pub use relevant_sources::{RelevantSourcesTool, DEFAULT_SOURCE_LIMIT};
pub use rewrite_document::RewriteDocumentTool;
pub use search_web_sources::{should_skip_url, SearchWebSourcesTool};

/// Characters of unified diff kept in an artifact preview
pub const DIFF_PREVIEW_CHARS: usize = 2000;

/// Title given to artifacts a tool produces.
pub fn artifact_title(tool_name: &str) -> String {
    format!("{} result", tool_name)
}
