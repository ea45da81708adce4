// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Source text chunking and keyword scoring
//!
//! Sources are cut into overlapping windows that end on sentence boundaries
//! where possible, then ranked against a query with a TF-IDF style score.

use std::collections::HashMap;

/// Characters per chunk
pub const CHUNK_SIZE: usize = 1200;

/// Characters shared by consecutive chunks
pub const CHUNK_OVERLAP: usize = CHUNK_SIZE / 3;

const TRIM_CHARS: &[char] = &['.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\''];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "can", "this", "that", "these", "those",
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
];

/// A window of source text with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    pub score: f64,
    pub index: usize,
    /// Char offset of the window this chunk was cut from
    pub start: usize,
    /// Char offset one past the end of that window
    pub end: usize,
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// A chunk that is not the last one is cut after the last `.` (else `?`,
/// else `!`) found in its final third. Chunks are trimmed.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size || chunk_size == 0 {
        return vec![TextChunk {
            text: text.to_string(),
            score: 0.0,
            index: 0,
            start: 0,
            end: chars.len(),
        }];
    }

    let step = (chunk_size - chunk_size / 3).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let mut window = &chars[start..end];

        if end < chars.len() {
            let search_start = window.len() * 2 / 3;
            let tail = &window[search_start..];
            let cut = ['.', '?', '!']
                .iter()
                .find_map(|boundary| tail.iter().rposition(|c| c == boundary));
            if let Some(offset) = cut {
                window = &window[..search_start + offset + 1];
            }
        }

        let chunk: String = window.iter().collect();
        chunks.push(TextChunk {
            text: chunk.trim().to_string(),
            score: 0.0,
            index: chunks.len(),
            start,
            end: start + window.len(),
        });

        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

fn clean_word(word: &str) -> String {
    word.trim_matches(TRIM_CHARS).to_lowercase()
}

/// Lowercased query words of at least three characters that are not stop words.
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(clean_word)
        .filter(|word| word.chars().count() >= 3 && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// TF-IDF style score, boosted by the share of keywords that matched.
pub fn relevance_score(text: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let total = words.len() as f64;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in &words {
        let word = clean_word(word);
        if word.chars().count() > 2 {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut score = 0.0;
    let mut matched = 0usize;
    for keyword in keywords {
        if let Some(&count) = counts.get(keyword) {
            let count = count as f64;
            score += (count / total) * (total / count).ln();
            matched += 1;
        }
    }

    score * (1.0 + matched as f64 / keywords.len() as f64)
}

/// Score every chunk against `query` and keep the best `max_chunks`, highest first.
pub fn most_relevant(mut chunks: Vec<TextChunk>, query: &str, max_chunks: usize) -> Vec<TextChunk> {
    let keywords = extract_keywords(query);
    for chunk in &mut chunks {
        chunk.score = relevance_score(&chunk.text, &keywords);
    }
    chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
    chunks.truncate(max_chunks);
    chunks
}
