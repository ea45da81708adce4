// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Diff engine
//!
//! Character-level edit scripts between two texts, reversible patches and the
//! change statistics attached to proposed document edits. Both the edit
//! script and the line-based unified diff shown to users come from
//! `similar`; the edit script is what `apply` and `revert` replay.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};
use std::ops::Range;
use std::time::{Duration, Instant};

use crate::error::{Result, ScribeError};

/// Time a minimal diff may take before `similar` settles for a coarser script
const DIFF_DEADLINE: Duration = Duration::from_secs(2);

/// Time budget for one fuzzy search over a document
const FUZZY_DEADLINE: Duration = Duration::from_secs(1);

/// Context lines around each unified diff hunk
const CONTEXT_LINES: usize = 3;

/// Kind of a single edit operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Insert,
    Delete,
    Equal,
}

/// One operation of an edit script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOp {
    #[serde(rename = "op")]
    pub kind: DiffKind,
    pub text: String,
}

impl DiffOp {
    pub fn insert(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Insert,
            text: text.into(),
        }
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Delete,
            text: text.into(),
        }
    }

    pub fn equal(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Equal,
            text: text.into(),
        }
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A reversible patch between two texts plus change statistics.
///
/// Counts are in characters. `additions_chars + unchanged_chars` is the
/// length of the updated text and `deletions_chars + unchanged_chars` the
/// length of the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPatch {
    pub unified_diff: String,
    pub ops: Vec<DiffOp>,
    pub additions_chars: usize,
    pub deletions_chars: usize,
    pub unchanged_chars: usize,
}

/// Compute a minimal character-level edit script from `original` to `updated`.
///
/// Within each changed region deletions come before insertions, and adjacent
/// operations of the same kind are merged.
pub fn diff(original: &str, updated: &str) -> Vec<DiffOp> {
    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .deadline(Instant::now() + DIFF_DEADLINE)
        .diff_chars(original, updated);

    let mut ops: Vec<DiffOp> = Vec::new();
    let mut deleted = String::new();
    let mut inserted = String::new();

    for change in text_diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => deleted.push_str(change.value()),
            ChangeTag::Insert => inserted.push_str(change.value()),
            ChangeTag::Equal => {
                flush_changes(&mut ops, &mut deleted, &mut inserted);
                match ops.last_mut() {
                    Some(last) if last.kind == DiffKind::Equal => last.text.push_str(change.value()),
                    _ => ops.push(DiffOp::equal(change.value())),
                }
            }
        }
    }
    flush_changes(&mut ops, &mut deleted, &mut inserted);

    ops
}

fn flush_changes(ops: &mut Vec<DiffOp>, deleted: &mut String, inserted: &mut String) {
    if !deleted.is_empty() {
        ops.push(DiffOp::delete(std::mem::take(deleted)));
    }
    if !inserted.is_empty() {
        ops.push(DiffOp::insert(std::mem::take(inserted)));
    }
}

/// Build a patch from an edit script.
pub fn patch(ops: Vec<DiffOp>) -> DiffPatch {
    let mut original = String::new();
    let mut updated = String::new();
    let (mut additions, mut deletions, mut unchanged) = (0, 0, 0);

    for op in &ops {
        match op.kind {
            DiffKind::Equal => {
                original.push_str(&op.text);
                updated.push_str(&op.text);
                unchanged += op.char_len();
            }
            DiffKind::Delete => {
                original.push_str(&op.text);
                deletions += op.char_len();
            }
            DiffKind::Insert => {
                updated.push_str(&op.text);
                additions += op.char_len();
            }
        }
    }

    DiffPatch {
        unified_diff: unified_diff(&original, &updated),
        ops,
        additions_chars: additions,
        deletions_chars: deletions,
        unchanged_chars: unchanged,
    }
}

/// Line-based unified diff text between two versions.
pub fn unified_diff(original: &str, updated: &str) -> String {
    if original == updated {
        return String::new();
    }
    TextDiff::from_lines(original, updated)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header("original", "updated")
        .to_string()
}

/// Locate the passage of `text` closest to `pattern`.
///
/// Candidate windows start at word boundaries and span about the pattern's
/// length; the best one is then widened or narrowed by up to
/// `max_difference` of the pattern length. Returns the byte range of that
/// window when its similarity to the pattern is at least
/// `1.0 - max_difference`.
pub fn fuzzy_find(text: &str, pattern: &str, max_difference: f32) -> Option<Range<usize>> {
    let pattern_len = pattern.chars().count();
    let first = pattern.chars().next()?;
    if text.is_empty() {
        return None;
    }

    // Byte offset of every char, plus the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = offsets.len() - 1;
    let deadline = Instant::now() + FUZZY_DEADLINE;
    let similarity = |start: usize, end: usize| {
        TextDiff::configure()
            .deadline(deadline)
            .diff_chars(&text[offsets[start]..offsets[end]], pattern)
            .ratio()
    };

    let mut best: Option<(f32, usize, usize)> = None;
    let mut previous: Option<char> = None;
    for (start, c) in text.chars().enumerate() {
        let word_start = previous.map_or(true, char::is_whitespace);
        previous = Some(c);
        if !word_start && c != first {
            continue;
        }
        if Instant::now() > deadline {
            break;
        }
        let end = (start + pattern_len).min(char_count);
        let score = similarity(start, end);
        if best.map_or(true, |(top, _, _)| score > top) {
            best = Some((score, start, end));
        }
    }

    let (mut score, start, mut end) = best?;
    let slack = (pattern_len as f32 * max_difference).ceil() as usize;
    let shortest = (start + 1).max(end.saturating_sub(slack));
    let longest = (end + slack).min(char_count);
    for candidate in shortest..=longest {
        let candidate_score = similarity(start, candidate);
        if candidate_score > score {
            score = candidate_score;
            end = candidate;
        }
    }

    (score >= 1.0 - max_difference).then(|| offsets[start]..offsets[end])
}

/// Replay `patch` on `original`, producing the updated text.
///
/// Fails with `Conflict` when `original` is not the text the patch was made
/// from.
pub fn apply(patch: &DiffPatch, original: &str) -> Result<String> {
    replay(&patch.ops, original, DiffKind::Delete, DiffKind::Insert)
}

/// Replay `patch` backwards on `updated`, recovering the original text.
pub fn revert(patch: &DiffPatch, updated: &str) -> Result<String> {
    replay(&patch.ops, updated, DiffKind::Insert, DiffKind::Delete)
}

fn replay(ops: &[DiffOp], source: &str, consumed: DiffKind, produced: DiffKind) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    for op in ops {
        if op.kind == produced {
            out.push_str(&op.text);
            continue;
        }
        rest = rest.strip_prefix(op.text.as_str()).ok_or_else(|| {
            ScribeError::Conflict(format!(
                "patch does not match source text at byte {}",
                source.len() - rest.len()
            ))
        })?;
        if op.kind != consumed {
            out.push_str(&op.text);
        }
    }

    if !rest.is_empty() {
        return Err(ScribeError::Conflict(format!(
            "patch leaves {} unmatched bytes of source text",
            rest.len()
        )));
    }

    Ok(out)
}

impl DiffPatch {
    /// Diff two texts and build the patch in one step.
    pub fn new(original: &str, updated: &str) -> Self {
        patch(diff(original, updated))
    }

    /// Whether the two texts were identical.
    pub fn is_unchanged(&self) -> bool {
        self.additions_chars == 0 && self.deletions_chars == 0
    }

    /// Unified diff text cut to `max_chars` characters for previews.
    pub fn preview(&self, max_chars: usize) -> String {
        if self.unified_diff.chars().count() <= max_chars {
            return self.unified_diff.clone();
        }
        let mut preview: String = self.unified_diff.chars().take(max_chars).collect();
        preview.push_str("...");
        preview
    }

    /// The `{additions, deletions, unchanged}` summary used in tool output.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "additions": self.additions_chars,
            "deletions": self.deletions_chars,
            "unchanged": self.unchanged_chars,
        })
    }
}
