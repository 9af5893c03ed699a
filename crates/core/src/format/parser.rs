//! Parsing of project files into the note model.
//!
//! Both dialects funnel into [`parse`], which classifies the text,
//! delegates to the dialect parser, flattens the note tree, builds the
//! link graph and collects diagnostics. Diagnostics are data: a hard
//! error excludes the offending note but parsing always continues.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use super::{Dialect, INDENT_WIDTH, detect_format};
use crate::ids;
use crate::links::LinkGraph;
use crate::model::{
    Author, Diagnostic, DiagnosticKind, Note, NoteLine, NoteProperties, NoteSet, NoteType,
    ParseResult, ProjectRoot,
};

static REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcm\.[a-z0-9]{6}\b").unwrap());

/// One physical line, tokenized.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    /// Indentation depth in units of [`INDENT_WIDTH`].
    pub depth: usize,
    /// Whether the line is a `- ` bullet.
    pub bullet: bool,
    /// Line content after indentation and bullet marker.
    pub content: String,
    /// The unmodified physical line.
    pub raw: String,
}

impl ParsedLine {
    pub fn is_blank(&self) -> bool {
        !self.bullet && self.content.is_empty()
    }
}

/// Tokenize one physical line.
pub fn parse_line(raw: &str) -> ParsedLine {
    let stripped = raw.trim_start_matches(' ');
    let indent = raw.len() - stripped.len();
    let depth = indent / INDENT_WIDTH;
    let (bullet, content) = match stripped.strip_prefix("- ") {
        Some(rest) => (true, rest),
        None if stripped == "-" => (true, ""),
        None => (false, stripped.trim_end()),
    };
    ParsedLine {
        depth,
        bullet,
        content: content.trim_end().to_string(),
        raw: raw.to_string(),
    }
}

/// Extract a `key: value` pair from a property-style line.
///
/// Returns `None` when the line is not a property. Keys are single
/// alphanumeric words, which keeps ordinary prose like `see: the docs`
/// from being swallowed only when callers check the key they expect.
pub fn parse_property(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty()
        || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some((key.to_lowercase(), value.trim().to_string()))
}

/// If `line` begins a canonical note block, return the note id.
pub fn is_note_block_start(line: &ParsedLine) -> Option<String> {
    if !line.bullet {
        return None;
    }
    let rest = line.content.strip_prefix('[')?;
    let (id, _) = rest.split_once(']')?;
    ids::is_valid_id(id).then(|| id.to_string())
}

/// Scan arbitrary text for note references.
///
/// The returned list is ordered by appearance and not deduplicated; the
/// link graph deduplicates at edge-insertion time.
pub fn extract_references(text: &str) -> Vec<String> {
    REF_RE.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

fn parse_metadata(rest: &str, props: &mut NoteProperties) {
    for segment in rest.split('·').map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(author) = Author::from_str(segment) {
            props.author = author;
        } else if let Some(kind) = NoteType::from_str(segment) {
            props.note_type = kind;
        } else if let Some(n) = segment.strip_prefix("line ") {
            props.line = n.trim().parse().ok();
        } else if let Ok(ts) = DateTime::parse_from_rfc3339(segment) {
            props.created = Some(ts.with_timezone(&Utc));
        }
    }
}

fn parse_related_list(value: &str) -> Vec<String> {
    value.split(',').filter_map(ids::extract_id_from_ref).collect()
}

/// Consume the block starting at `lines[start]` and return the note with
/// recursively parsed children plus the index of the first line after
/// the block. Returns `None` when `lines[start]` is not a block start.
pub fn parse_note_block(
    lines: &[ParsedLine],
    start: usize,
    warnings: &mut Vec<Diagnostic>,
) -> Option<(Note, usize)> {
    let head = &lines[start];
    let id = is_note_block_start(head)?;
    let base = head.depth;

    let mut props = NoteProperties::new(id);
    let meta = head.content.splitn(2, ']').nth(1).unwrap_or("");
    parse_metadata(meta, &mut props);
    let mut note = Note::new(props);

    let mut i = start + 1;

    // Optional property lines, only directly after the metadata bullet.
    // `related` lists extra references; `parent` records a parent that
    // nesting cannot express (cross-file or unresolved).
    while i < lines.len()
        && !lines[i].bullet
        && lines[i].depth == base + 1
        && let Some((key, value)) = parse_property(&lines[i].content)
        && matches!(key.as_str(), "related" | "parent")
    {
        match key.as_str() {
            "related" => note.props.related = parse_related_list(&value),
            _ => note.props.parent = ids::extract_id_from_ref(&value),
        }
        i += 1;
    }

    while i < lines.len() {
        let line = &lines[i];
        if line.is_blank() {
            // Blank lines are not content; the block continues only if a
            // deeper line follows.
            match lines[i + 1..].iter().find(|l| !l.is_blank()) {
                Some(next) if next.depth > base => {
                    i += 1;
                    continue;
                }
                _ => break,
            }
        }
        if line.depth <= base {
            break;
        }
        if is_note_block_start(line).is_some() {
            if line.depth != base + 1 {
                warnings.push(Diagnostic::warning(
                    DiagnosticKind::IndentationMismatch,
                    Some(i + 1),
                    format!(
                        "child of {} indented {} levels past its parent",
                        note.id(),
                        line.depth - base
                    ),
                ));
            }
            let (child, next) = parse_note_block(lines, i, warnings)
                .expect("block start already verified");
            note.children.push(child);
            i = next;
        } else {
            let text = if line.bullet {
                // A leading `\[` is the writer's escape for content that
                // would otherwise lex as a note block start.
                match line.content.strip_prefix("\\[") {
                    Some(rest) => format!("- [{rest}"),
                    None => format!("- {}", line.content),
                }
            } else {
                line.content.clone()
            };
            let depth = line.depth.saturating_sub(base + 1);
            note.lines.push(NoteLine::new(depth, text));
            i += 1;
        }
    }

    Some((note, i))
}

fn set_file_recursive(note: &mut Note, file: &str) {
    note.props.file = Some(file.to_string());
    for child in &mut note.children {
        set_file_recursive(child, file);
    }
}

/// Parse the canonical bullet/indentation dialect.
///
/// Returns the project root (if the file carries a `#` header), the
/// top-level notes with children still nested, and diagnostics.
pub fn parse_new_format(
    text: &str,
) -> (Option<ProjectRoot>, Vec<Note>, Vec<Diagnostic>, Vec<Diagnostic>) {
    let lines: Vec<ParsedLine> = text.lines().map(parse_line).collect();
    let mut root: Option<ProjectRoot> = None;
    let mut notes = Vec::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut current_file: Option<String> = None;
    let mut in_map = false;

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if line.is_blank() {
            i += 1;
            continue;
        }

        // Headings are only structural at column zero.
        if !line.bullet && line.depth == 0 {
            if let Some(heading) = line.content.strip_prefix("## ") {
                let heading = heading.trim();
                if heading == "Map" {
                    // The map is a regenerated convenience index; its
                    // bullets are not note blocks.
                    in_map = true;
                    current_file = None;
                } else {
                    in_map = false;
                    current_file = Some(heading.to_string());
                }
                i += 1;
                continue;
            }
            if let Some(name) = line.content.strip_prefix("# ") {
                root = Some(ProjectRoot { name: name.trim().to_string(), ..Default::default() });
                i += 1;
                continue;
            }
        }

        if in_map {
            i += 1;
            continue;
        }

        if let Some(id) = is_note_block_start(line) {
            match &current_file {
                Some(file) => {
                    let (mut note, next) = parse_note_block(&lines, i, &mut warnings)
                        .expect("block start already verified");
                    set_file_recursive(&mut note, file);
                    notes.push(note);
                    i = next;
                }
                None => {
                    errors.push(Diagnostic::error(
                        DiagnosticKind::InvalidBlock,
                        Some(i + 1),
                        format!("note block {id} outside a file section"),
                    ));
                    // Consume the block so its lines do not cascade.
                    let (_, next) = parse_note_block(&lines, i, &mut warnings)
                        .expect("block start already verified");
                    i = next;
                }
            }
            continue;
        }

        // Project header bullets: created / note.
        if line.bullet
            && line.depth == 0
            && current_file.is_none()
            && let Some((key, value)) = parse_property(&line.content)
            && let Some(ref mut project) = root
        {
            match key.as_str() {
                "created" => {
                    project.created = DateTime::parse_from_rfc3339(&value)
                        .ok()
                        .map(|ts| ts.with_timezone(&Utc));
                    i += 1;
                    continue;
                }
                "note" => {
                    project.notes.push(value);
                    i += 1;
                    continue;
                }
                _ => {}
            }
        }

        errors.push(Diagnostic::error(
            DiagnosticKind::InvalidBlock,
            Some(i + 1),
            format!("unexpected content outside a note block: {:?}", line.content),
        ));
        i += 1;
    }

    (root, notes, errors, warnings)
}

/// A legacy block header is `[...]` alone at column zero.
fn legacy_header(line: &str) -> Option<&str> {
    if line.starts_with(' ') {
        return None;
    }
    line.strip_prefix('[').and_then(|s| s.strip_suffix(']'))
}

/// Parse the legacy flat property-block dialect (read-only, migration).
pub fn parse_old_format(
    text: &str,
) -> (Option<ProjectRoot>, Vec<Note>, Vec<Diagnostic>, Vec<Diagnostic>) {
    let lines: Vec<&str> = text.lines().collect();
    let mut root: Option<ProjectRoot> = None;
    let mut notes = Vec::new();
    let mut errors = Vec::new();
    let warnings = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let Some(header) = legacy_header(lines[i]) else {
            if !lines[i].trim().is_empty() {
                errors.push(Diagnostic::error(
                    DiagnosticKind::InvalidBlock,
                    Some(i + 1),
                    format!("unexpected content outside a block: {:?}", lines[i].trim()),
                ));
            }
            i += 1;
            continue;
        };

        if header == "project" {
            let (project, next) = parse_old_project(&lines, i + 1);
            match project.name.is_empty() {
                true => errors.push(Diagnostic::error(
                    DiagnosticKind::MissingProperty,
                    Some(i + 1),
                    "project block is missing the name property",
                )),
                false => root = Some(project),
            }
            i = next;
            continue;
        }

        if !ids::is_valid_id(header) {
            errors.push(Diagnostic::error(
                DiagnosticKind::InvalidBlock,
                Some(i + 1),
                format!("malformed block header: [{header}]"),
            ));
            i += 1;
            continue;
        }

        let (note, next) = parse_old_note(header, &lines, i + 1);
        if note.props.file.is_none() {
            errors.push(Diagnostic::error(
                DiagnosticKind::MissingProperty,
                Some(i + 1),
                format!("note {} is missing the file property", note.id()),
            ));
        } else {
            notes.push(note);
        }
        i = next;
    }

    (root, notes, errors, warnings)
}

fn parse_old_project(lines: &[&str], start: usize) -> (ProjectRoot, usize) {
    let mut project = ProjectRoot::default();
    let mut i = start;
    while i < lines.len() && !lines[i].starts_with('[') {
        if let Some((key, value)) = parse_property(lines[i]) {
            match key.as_str() {
                "name" => project.name = value,
                "created" => {
                    project.created = DateTime::parse_from_rfc3339(&value)
                        .ok()
                        .map(|ts| ts.with_timezone(&Utc));
                }
                "note" => project.notes.push(value),
                _ => {}
            }
        }
        i += 1;
    }
    (project, i)
}

fn parse_old_note(id: &str, lines: &[&str], start: usize) -> (Note, usize) {
    let mut note = Note::new(NoteProperties::new(id));
    let mut i = start;
    let mut in_content = false;

    while i < lines.len() && !lines[i].starts_with('[') {
        let raw = lines[i];
        if in_content {
            if raw.trim().is_empty() {
                i += 1;
                continue;
            }
            let stripped = raw.strip_prefix("  ").unwrap_or(raw.trim_start());
            let inner = stripped.trim_start_matches(' ');
            let depth = (stripped.len() - inner.len()) / INDENT_WIDTH;
            note.lines.push(NoteLine::new(depth, inner.trim_end()));
            i += 1;
            continue;
        }
        if raw.trim() == "content:" {
            in_content = true;
            i += 1;
            continue;
        }
        if let Some((key, value)) = parse_property(raw) {
            match key.as_str() {
                "file" => note.props.file = Some(value),
                "line" => note.props.line = value.parse().ok(),
                "type" => {
                    if let Some(kind) = NoteType::from_str(&value) {
                        note.props.note_type = kind;
                    }
                }
                "author" => {
                    if let Some(author) = Author::from_str(&value) {
                        note.props.author = author;
                    }
                }
                "created" => {
                    note.props.created = DateTime::parse_from_rfc3339(&value)
                        .ok()
                        .map(|ts| ts.with_timezone(&Utc));
                }
                "parent" => note.props.parent = ids::extract_id_from_ref(&value),
                "related" => note.props.related = parse_related_list(&value),
                _ => {}
            }
        }
        i += 1;
    }
    (note, i)
}

fn flatten(
    nested: Vec<Note>,
    parent: Option<&str>,
    set: &mut NoteSet,
    errors: &mut Vec<Diagnostic>,
) {
    for mut note in nested {
        if note.props.parent.is_none() {
            note.props.parent = parent.map(String::from);
        }
        let id = note.id().to_string();
        let children = std::mem::take(&mut note.children);
        if !set.insert(note) {
            errors.push(Diagnostic::error(
                DiagnosticKind::DuplicateId,
                None,
                format!("duplicate note id {id}, later occurrence excluded"),
            ));
            // Children still belong to the first occurrence of the id.
        }
        flatten(children, Some(&id), set, errors);
    }
}

/// Parse a whole project file in either dialect.
pub fn parse(text: &str) -> ParseResult {
    let dialect = detect_format(text);
    let (project, nested, mut errors, mut warnings) = match dialect {
        Dialect::Canonical => parse_new_format(text),
        Dialect::Legacy => parse_old_format(text),
    };

    let mut notes = NoteSet::new();
    flatten(nested, None, &mut notes, &mut errors);

    let graph = LinkGraph::rebuild_all(notes.iter());

    for note in notes.iter() {
        if let Some(parent) = &note.props.parent
            && !notes.contains(parent)
        {
            warnings.push(Diagnostic::warning(
                DiagnosticKind::UnknownReference,
                None,
                format!("{} declares unknown parent {parent}", note.id()),
            ));
        }
        for target in graph.forward_links(note.id()) {
            if !notes.contains(target) {
                warnings.push(Diagnostic::warning(
                    DiagnosticKind::UnknownReference,
                    None,
                    format!("{} references unknown note {target}", note.id()),
                ));
            }
        }
    }

    let counts: Vec<(String, usize)> = notes
        .iter()
        .map(|n| (n.id().to_string(), graph.backlink_count(n.id())))
        .collect();
    for (id, count) in counts {
        if let Some(note) = notes.get_mut(&id) {
            note.props.backlink_count = count;
        }
    }

    debug!(
        dialect = ?dialect,
        notes = notes.len(),
        errors = errors.len(),
        warnings = warnings.len(),
        "parsed project file"
    );

    ParseResult { project, notes, graph, errors, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    const CANONICAL: &str = "\
# myproject
- created: 2026-08-30T10:00:00Z
- note: scratch notes for the demo

## Map
- src/main.rs
  - [cm.abc123] entry point wiring

## src/main.rs
- [cm.abc123] human · 2026-08-30T10:00:00Z · line 42
  entry point wiring, see [cm.def456]
  - [cm.ghi789] ai · 2026-08-30T10:05:00Z · line 50 · memory
    remember the flag ordering

## src/lib.rs
- [cm.def456] human · 2026-08-30T11:00:00Z · line 7
  related: cm.abc123
  exported surface
";

    #[test]
    fn parse_line_tokenizes() {
        let l = parse_line("    - [cm.abc123] human");
        assert_eq!(l.depth, 2);
        assert!(l.bullet);
        assert_eq!(l.content, "[cm.abc123] human");

        let l = parse_line("  plain content");
        assert_eq!(l.depth, 1);
        assert!(!l.bullet);
        assert_eq!(l.content, "plain content");
    }

    #[test]
    fn parse_property_extracts_pairs() {
        assert_eq!(
            parse_property("related: cm.abc123"),
            Some(("related".to_string(), "cm.abc123".to_string()))
        );
        assert_eq!(parse_property("no property here"), None);
        assert_eq!(parse_property("a key with spaces: x"), None);
    }

    #[test]
    fn block_start_detection() {
        let l = parse_line("- [cm.abc123] human · 2026-08-30T10:00:00Z");
        assert_eq!(is_note_block_start(&l).as_deref(), Some("cm.abc123"));

        let l = parse_line("- not a block");
        assert!(is_note_block_start(&l).is_none());

        let l = parse_line("  [cm.abc123] without bullet");
        assert!(is_note_block_start(&l).is_none());
    }

    #[test]
    fn reference_extraction_ordered_with_repeats() {
        let refs =
            extract_references("see [cm.def456], then cm.abc123, then [cm.def456] again");
        assert_eq!(refs, vec!["cm.def456", "cm.abc123", "cm.def456"]);
        assert!(extract_references("cm.toolong1 and xcm.abc123").is_empty());
    }

    #[test]
    fn parse_canonical_full() {
        let result = parse(CANONICAL);
        assert!(result.errors.is_empty(), "errors: {:?}", result.errors);

        let project = result.project.as_ref().unwrap();
        assert_eq!(project.name, "myproject");
        assert!(project.created.is_some());
        assert_eq!(project.notes, vec!["scratch notes for the demo"]);

        assert_eq!(result.notes.len(), 3);
        let root = result.notes.get("cm.abc123").unwrap();
        assert_eq!(root.props.file.as_deref(), Some("src/main.rs"));
        assert_eq!(root.props.line, Some(42));
        assert_eq!(root.props.author, Author::Human);

        let child = result.notes.get("cm.ghi789").unwrap();
        assert_eq!(child.props.parent.as_deref(), Some("cm.abc123"));
        assert_eq!(child.props.note_type, NoteType::Memory);
        assert_eq!(child.props.file.as_deref(), Some("src/main.rs"));

        let related = result.notes.get("cm.def456").unwrap();
        assert_eq!(related.props.related, vec!["cm.abc123"]);
    }

    #[test]
    fn parse_builds_link_graph() {
        let result = parse(CANONICAL);
        assert_eq!(result.graph.forward_links("cm.abc123"), ["cm.def456"]);
        assert_eq!(result.graph.backward_links("cm.def456"), ["cm.abc123"]);
        assert_eq!(result.graph.backlink_count("cm.def456"), 1);
        assert_eq!(result.notes.get("cm.def456").unwrap().props.backlink_count, 1);
    }

    #[test]
    fn map_section_is_ignored() {
        let result = parse(CANONICAL);
        // The map mentions cm.abc123 under a bullet, which must not
        // produce a second parse of the note.
        assert_eq!(result.notes.len(), 3);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn duplicate_id_is_error_first_occurrence_kept() {
        let text = "\
## a.rs
- [cm.abc123] human
  first
- [cm.abc123] ai
  second
";
        let result = parse(text);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, DiagnosticKind::DuplicateId);
        assert_eq!(result.errors[0].severity, Severity::Error);
        let kept = result.notes.get("cm.abc123").unwrap();
        assert_eq!(kept.first_line(), Some("first"));
    }

    #[test]
    fn unknown_reference_is_warning_not_error() {
        let text = "\
## a.rs
- [cm.abc123] human
  points at [cm.zzz999]
";
        let result = parse(text);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, DiagnosticKind::UnknownReference);
        assert_eq!(result.notes.len(), 1);
    }

    #[test]
    fn block_outside_file_section_is_error() {
        let text = "\
# proj
- [cm.abc123] human
  dangling
";
        let result = parse(text);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, DiagnosticKind::InvalidBlock);
        assert!(result.notes.is_empty());
    }

    #[test]
    fn over_indented_child_warns_but_parses() {
        let text = "\
## a.rs
- [cm.abc123] human
  parent content
      - [cm.def456] ai
        deep child
";
        let result = parse(text);
        assert!(result.errors.is_empty());
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.kind == DiagnosticKind::IndentationMismatch)
        );
        let child = result.notes.get("cm.def456").unwrap();
        assert_eq!(child.props.parent.as_deref(), Some("cm.abc123"));
    }

    const LEGACY: &str = "\
[project]
name: oldproj
created: 2025-01-01T00:00:00Z

[cm.abc123]
file: src/main.rs
line: 42
type: note
author: human
created: 2025-01-02T00:00:00Z
related: cm.def456
content:
  top line referencing cm.def456
    indented continuation

[cm.def456]
file: src/lib.rs
author: ai
parent: cm.abc123
content:
  child body
";

    #[test]
    fn legacy_header_detection() {
        assert_eq!(legacy_header("[project]"), Some("project"));
        assert_eq!(legacy_header("[cm.abc123]"), Some("cm.abc123"));
        assert_eq!(legacy_header("  [cm.abc123]"), None);
        assert_eq!(legacy_header("plain line"), None);
    }

    #[test]
    fn parse_legacy_full() {
        assert_eq!(detect_format(LEGACY), Dialect::Legacy);
        let result = parse(LEGACY);
        assert!(result.errors.is_empty(), "errors: {:?}", result.errors);

        assert_eq!(result.project.as_ref().unwrap().name, "oldproj");
        assert_eq!(result.notes.len(), 2);

        let a = result.notes.get("cm.abc123").unwrap();
        assert_eq!(a.props.line, Some(42));
        assert_eq!(a.props.related, vec!["cm.def456"]);
        assert_eq!(a.lines.len(), 2);
        assert_eq!(a.lines[1].depth, 1);

        let b = result.notes.get("cm.def456").unwrap();
        assert_eq!(b.props.parent.as_deref(), Some("cm.abc123"));
        assert_eq!(b.props.author, Author::Ai);

        // Content ref and related both point at cm.def456 from cm.abc123,
        // deduplicated to a single edge.
        assert_eq!(result.graph.forward_links("cm.abc123"), ["cm.def456"]);
        assert_eq!(result.graph.backlink_count("cm.def456"), 1);
    }

    #[test]
    fn legacy_note_without_file_is_excluded() {
        let text = "[cm.abc123]\nauthor: human\ncontent:\n  orphaned\n";
        let result = parse(text);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, DiagnosticKind::MissingProperty);
        assert!(result.notes.is_empty());
    }
}
