//! Keyword search over note content.
//!
//! Matching is a case-insensitive substring scan over every content
//! line. Each note is scored by match count with a boost for matches on
//! its first line; results sort descending by score, ties keeping
//! document order, and truncate to the caller's limit.

use serde::{Deserialize, Serialize};

use crate::model::{Note, NoteSet};

/// Byte span of one match within a content line (coordinates in the
/// lowercased line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSpan {
    /// Index of the content line within the note.
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// One scored search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub path: String,
    pub score: f64,
    pub spans: Vec<MatchSpan>,
    /// The first matching line, for display.
    pub snippet: String,
}

/// Scan `notes` for `query`, scoring and ranking matches.
pub fn search(notes: &NoteSet, query: &str, limit: usize) -> Vec<SearchHit> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = notes
        .iter()
        .filter_map(|note| score_note(note, &needle))
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

fn score_note(note: &Note, needle: &str) -> Option<SearchHit> {
    let mut spans = Vec::new();
    let mut snippet = None;

    for (line_idx, line) in note.lines.iter().enumerate() {
        let haystack = line.text.to_lowercase();
        let mut from = 0;
        while let Some(pos) = haystack[from..].find(needle) {
            let start = from + pos;
            spans.push(MatchSpan { line: line_idx, start, end: start + needle.len() });
            if snippet.is_none() {
                snippet = Some(line.text.clone());
            }
            from = start + needle.len();
        }
    }

    if spans.is_empty() {
        return None;
    }

    let first_line_matches = spans.iter().filter(|s| s.line == 0).count();
    #[allow(clippy::cast_precision_loss)]
    let score = spans.len() as f64 + 0.5 * first_line_matches as f64;

    Some(SearchHit {
        id: note.id().to_string(),
        path: note.display_path(),
        score,
        spans,
        snippet: snippet.unwrap_or_default(),
    })
}
