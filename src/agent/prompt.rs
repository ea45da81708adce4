// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt assembly
//!
//! The system prompt and the first user turn. The document itself is only
//! reachable through `read_document`; the turn carries its heading outline.

use regex::Regex;
use std::sync::LazyLock;

/// System prompt for the writing assistant
pub const SYSTEM_PROMPT: &str = "You are a writing assistant working on one article with its author.

Use the tools to act on the document instead of pasting edited text into the chat:
- read_document shows the current text with line numbers. Read before editing.
- edit_text replaces one passage. original_text must match the document exactly and be unique.
- rewrite_document replaces the whole document when the change is too broad for edit_text.
- analyze_document records which aspect of the writing to focus on.
- get_relevant_sources and search_web_sources find material to support claims.
- ask_question answers a specific factual question with cited web pages.
- generate_text_content drafts new content from a prompt and optional source excerpts.
- generate_image_prompt writes a prompt for an illustration.

Every edit is shown to the author as a proposal they accept or reject. Keep edits focused and explain each one in a sentence.
Write like a person: concrete detail, varied sentences, no puffery, no filler, sentence case headings.";

/// `# Title`, `## Title ##`: one to six hashes followed by whitespace
static MARKDOWN_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(#{1,6})[ \t]+(.*?)\s*$").expect("markdown heading pattern")
});

/// `<h2 class="x">Title</h2>` on a single line
static HTML_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*<h([1-6])(?:\s[^>]*)?>(.*?)(?:</h[1-6]\s*>)?\s*$").expect("html heading pattern")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("html tag pattern"));

/// Shown in place of an outline when the document has no headings
const NO_HEADINGS: &str = "(no headings)";

/// Build the first user turn: the request, followed by the document outline
/// when a document was sent along.
pub fn user_prompt(message: &str, document: Option<&str>) -> String {
    match document.filter(|d| !d.trim().is_empty()) {
        Some(document) => format!(
            "{}\n\n--- Document Layout (use read_document to see full content) ---\n{}",
            message,
            document_outline(document)
        ),
        None => message.to_string(),
    }
}

/// Heading outline of a markdown or HTML document, one heading per line with
/// its 1-indexed line number. Levels below 2 are indented two spaces each.
pub fn document_outline(document: &str) -> String {
    let outline: Vec<String> = document
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let (level, text) = markdown_heading(line).or_else(|| html_heading(line))?;
            let indent = "  ".repeat(level.saturating_sub(2));
            Some(format!("{}- {} (line {})", indent, text, index + 1))
        })
        .collect();

    if outline.is_empty() {
        NO_HEADINGS.to_string()
    } else {
        outline.join("\n")
    }
}

fn markdown_heading(line: &str) -> Option<(usize, String)> {
    let caps = MARKDOWN_HEADING.captures(line)?;
    heading(caps.get(1)?.as_str().len(), caps.get(2)?.as_str().trim_end_matches('#'))
}

fn html_heading(line: &str) -> Option<(usize, String)> {
    let caps = HTML_HEADING.captures(line)?;
    let level = caps.get(1)?.as_str().parse().ok()?;
    heading(level, &HTML_TAG.replace_all(caps.get(2)?.as_str(), ""))
}

fn heading(level: usize, text: &str) -> Option<(usize, String)> {
    let text = text.trim();
    (!text.is_empty()).then(|| (level, text.to_string()))
}
