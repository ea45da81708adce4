// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Edit text tool
//!
//! Replaces one passage of the document and proposes the result as a
//! `code_edit` artifact.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::artifacts::ArtifactDraft;
use crate::conversation::ArtifactType;
use crate::diff::{fuzzy_find, DiffPatch};
use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext, ToolResult};

use super::{artifact_title, DIFF_PREVIEW_CHARS};

const NAME: &str = "edit_text";

/// Escapes models tend to add to text they copy out of the document
const ESCAPES: &[(&str, &str)] = &[
    ("\\*", "*"),
    ("\\_", "_"),
    ("\\[", "["),
    ("\\]", "]"),
    ("\\#", "#"),
    ("\\`", "`"),
    ("\\&", "&"),
    ("\\u0026", "&"),
    ("\\u003c", "<"),
    ("\\u003e", ">"),
    ("\\u0022", "\""),
    ("\\u0027", "'"),
];

/// Share of characters a fuzzy match may differ by
const FUZZY_MAX_DIFFERENCE: f32 = 0.3;

/// Shorter passages are only matched exactly or after normalization
const FUZZY_MIN_CHARS: usize = 12;

/// Tool for replacing a passage of the document
pub struct EditTextTool;

fn unescape(text: &str) -> String {
    ESCAPES
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Unescape, then collapse runs of spaces and tabs. Newlines are kept.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in unescape(text).chars() {
        if c == ' ' || c == '\t' {
            if !previous_space {
                out.push(' ');
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    out
}

#[derive(Debug, PartialEq)]
enum Located {
    Unique(String),
    Ambiguous,
    Missing,
}

/// Replace the single occurrence of `original` in `document`.
///
/// Tries the text as given, then with escapes removed, then with whitespace
/// collapsed as well. When a normalized form matches, the normalized
/// document is the one edited. Longer passages finally fall back to the
/// closest fuzzy match in the unmodified document.
fn replace_unique(document: &str, original: &str, replacement: &str) -> Located {
    let normalizers: [fn(&str) -> String; 3] = [str::to_string, unescape, collapse_whitespace];

    for normalize in normalizers {
        let doc = normalize(document);
        let needle = normalize(original);
        if needle.is_empty() {
            continue;
        }
        let Some(first) = doc.find(&needle) else {
            continue;
        };
        if doc.rfind(&needle) != Some(first) {
            return Located::Ambiguous;
        }
        let mut updated = String::with_capacity(doc.len() + replacement.len());
        updated.push_str(&doc[..first]);
        updated.push_str(replacement);
        updated.push_str(&doc[first + needle.len()..]);
        return Located::Unique(updated);
    }

    if original.chars().count() >= FUZZY_MIN_CHARS {
        if let Some(range) = fuzzy_find(document, original, FUZZY_MAX_DIFFERENCE) {
            tracing::debug!(start = range.start, end = range.end, "Matched passage fuzzily");
            let mut updated = document.to_string();
            updated.replace_range(range, replacement);
            return Located::Unique(updated);
        }
    }

    Located::Missing
}

#[async_trait]
impl Tool for EditTextTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Replace one passage of the document with new text. original_text must match the \
                          document exactly and appear only once; include surrounding context to make it unique. \
                          Call read_document first to see the current text. The edit is proposed to the user \
                          for approval."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("original_text", "The exact text to replace", true)
                .string("new_text", "The replacement text", true)
                .string("reason", "Brief explanation of the edit", true)
                .build(),
        }
    }

    async fn execute(&self, tool_use_id: String, input: Value, context: &ToolContext) -> Result<ToolResult> {
        let original = required_str(&input, "original_text")?;
        let new_text = required_str(&input, "new_text")?;
        let reason = input["reason"].as_str().unwrap_or_default();

        let patch = DiffPatch::new(original, new_text);
        let mut output = json!({
            "original_text": original,
            "new_text": new_text,
            "reason": reason,
            "tool_name": NAME,
            "patch": {
                "unified_diff": patch.unified_diff,
                "summary": patch.summary(),
            },
        });

        let mut artifact_content = new_text.to_string();
        if let Some(document) = context.document().await {
            match replace_unique(&document, original, new_text) {
                Located::Unique(updated) => {
                    tracing::debug!(
                        request_id = %context.request_id,
                        old_len = document.len(),
                        new_len = updated.len(),
                        "Edit applied to working document"
                    );
                    output["new_document"] = json!(updated);
                    context.set_document(updated.clone()).await;
                    artifact_content = updated;
                }
                Located::Ambiguous => {
                    return Ok(ToolResult::error(
                        tool_use_id,
                        "original_text appears multiple times in the document. Include more surrounding context to make it unique.",
                    ));
                }
                Located::Missing => {
                    return Ok(ToolResult::error(
                        tool_use_id,
                        "Could not locate the text to edit. The text may contain special characters that were modified during formatting.",
                    ));
                }
            }
        } else {
            tracing::debug!("No document in context, returning edit without validation");
        }

        let mut draft = ArtifactDraft::new(ArtifactType::CodeEdit, artifact_content)
            .with_title(artifact_title(NAME))
            .with_diff_preview(patch.preview(DIFF_PREVIEW_CHARS));
        if !reason.is_empty() {
            draft = draft.with_description(reason);
        }

        Ok(ToolResult::json(tool_use_id, &output)
            .with_metadata(output.clone())
            .with_artifact(draft))
    }
}
