//! Core data model: notes, their properties, the project root, and the
//! parse result produced by the format layer.
//!
//! Notes are held flat, keyed by id. The parent/child tree is encoded by
//! the `parent` property and materialized on demand; child `Note` values
//! are never duplicated into a second owned graph.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;
use crate::links::LinkGraph;

/// Note classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    /// A regular annotation attached to a source location.
    #[default]
    Note,
    /// A longer-lived memory entry.
    Memory,
}

impl NoteType {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "note" => Some(Self::Note),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Memory => "memory",
        }
    }
}

/// Who wrote a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    #[default]
    Human,
    Ai,
}

impl Author {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }
}

/// Properties of a note.
///
/// `id` is immutable once assigned. `backlink_count` is a cache derived
/// from the link graph; it is refreshed on every graph mutation and must
/// never be treated as ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteProperties {
    /// Opaque identifier, `cm.` plus a six-char suffix.
    pub id: String,
    /// Note classification.
    #[serde(rename = "type")]
    pub note_type: NoteType,
    /// Source file the note is attached to.
    pub file: Option<String>,
    /// Source line within the file (1-based).
    pub line: Option<u32>,
    /// Who wrote the note.
    pub author: Author,
    /// Creation timestamp.
    pub created: Option<DateTime<Utc>>,
    /// Id of the parent note, if nested.
    pub parent: Option<String>,
    /// Explicitly related note ids (in addition to inline references).
    pub related: Vec<String>,
    /// Cached number of distinct notes linking here (derived).
    pub backlink_count: usize,
}

impl NoteProperties {
    /// Minimal properties for a fresh note.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            note_type: NoteType::default(),
            file: None,
            line: None,
            author: Author::default(),
            created: None,
            parent: None,
            related: Vec::new(),
            backlink_count: 0,
        }
    }
}

/// One logical content line of a note.
///
/// `refs` is derived by reference extraction over `text` and is rebuilt
/// whenever the text changes; it is never edited independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteLine {
    /// Indentation depth relative to the note's own content base.
    pub depth: usize,
    /// The line text, without structural indentation.
    pub text: String,
    /// Note ids referenced on this line, in order of appearance.
    pub refs: Vec<String>,
}

impl NoteLine {
    /// Build a line, extracting references from the text.
    pub fn new(depth: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let refs = crate::format::parser::extract_references(&text);
        Self { depth, text, refs }
    }
}

/// An atomic, identified annotation.
///
/// Identity is the id; position in the forest is determined by the
/// `parent` property, not by physical file order. In the flat store the
/// `children` vector is empty; it is only populated transiently by the
/// parser while a block is being assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub props: NoteProperties,
    /// Ordered content lines.
    pub lines: Vec<NoteLine>,
    /// Nested child notes (parser-transient, drained on flattening).
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Note>,
}

impl Note {
    pub fn new(props: NoteProperties) -> Self {
        Self { props, lines: Vec::new(), children: Vec::new() }
    }

    /// The note id.
    pub fn id(&self) -> &str {
        &self.props.id
    }

    /// Display path, recomputed from file, id and immediate parent.
    pub fn display_path(&self) -> String {
        ids::display_path(
            self.props.file.as_deref().unwrap_or(""),
            &self.props.id,
            self.props.parent.as_deref(),
        )
    }

    /// All content joined with newlines, relative indentation restored.
    pub fn content_text(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for _ in 0..line.depth {
                out.push_str("  ");
            }
            out.push_str(&line.text);
        }
        out
    }

    /// First non-empty content line, if any.
    pub fn first_line(&self) -> Option<&str> {
        self.lines.iter().map(|l| l.text.trim()).find(|t| !t.is_empty())
    }

    /// Replace the content with `text`, re-deriving per-line references.
    pub fn set_content(&mut self, text: &str) {
        self.lines = text
            .lines()
            .map(|raw| {
                let stripped = raw.trim_start_matches(' ');
                let depth = (raw.len() - stripped.len()) / 2;
                NoteLine::new(depth, stripped)
            })
            .collect();
    }
}

/// Top-level metadata record for one project file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectRoot {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    /// Free-form project-level notes.
    pub notes: Vec<String>,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    DuplicateId,
    InvalidBlock,
    MissingProperty,
    UnknownReference,
    IndentationMismatch,
}

/// A parse-time diagnostic. Diagnostics are data, never panics: errors
/// exclude the offending note from the model, warnings are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// 1-based source line, when known.
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, line: Option<usize>, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, kind, line, message: message.into() }
    }

    pub fn warning(kind: DiagnosticKind, line: Option<usize>, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, kind, line, message: message.into() }
    }
}

/// Flat, id-keyed collection of notes preserving document order.
#[derive(Debug, Clone, Default)]
pub struct NoteSet {
    notes: Vec<Note>,
    index: HashMap<String, usize>,
}

impl NoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a note. Returns false (and leaves the set unchanged) if the
    /// id is already present.
    pub fn insert(&mut self, note: Note) -> bool {
        if self.index.contains_key(note.id()) {
            return false;
        }
        self.index.insert(note.id().to_string(), self.notes.len());
        self.notes.push(note);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.index.get(id).map(|&i| &self.notes[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.index.get(id).copied().map(move |i| &mut self.notes[i])
    }

    /// Remove a note by id. Positions after it shift down.
    pub fn remove(&mut self, id: &str) -> Option<Note> {
        let i = self.index.remove(id)?;
        let note = self.notes.remove(i);
        for (pos, n) in self.notes.iter().enumerate().skip(i) {
            self.index.insert(n.id().to_string(), pos);
        }
        Some(note)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Notes in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    /// Direct children of `id`, in document order.
    pub fn children_of(&self, id: &str) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.props.parent.as_deref() == Some(id)).collect()
    }

    /// Ids of `id` and all its descendants, in document order.
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(cur) = stack.pop() {
            for child in self.children_of(&cur) {
                stack.push(child.id().to_string());
            }
            out.push(cur);
        }
        out
    }
}

/// Result of parsing one project file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// Project metadata, if the file carried a header.
    pub project: Option<ProjectRoot>,
    /// All notes, flattened, keyed by id.
    pub notes: NoteSet,
    /// Forward and backward links derived from note content.
    pub graph: LinkGraph,
    /// Hard errors (offending notes are excluded from `notes`).
    pub errors: Vec<Diagnostic>,
    /// Informational warnings (notes are still included).
    pub warnings: Vec<Diagnostic>,
}
