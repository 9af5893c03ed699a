//! Serialization of the note model back to the canonical dialect.
//!
//! The writer is the parser's inverse for the canonical dialect only;
//! legacy files are rewritten canonically on save. Round-trip contract:
//! any text the parser accepts without errors re-parses from the
//! writer's output into a semantically equal model.

use std::borrow::Cow;
use std::collections::HashSet;

use chrono::SecondsFormat;
use tracing::debug;

use crate::ids;
use crate::model::{Note, NoteProperties, NoteSet, NoteType, ProjectRoot};

/// Output options for [`write`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Stable-sort notes within each file by source line (original order
    /// breaks ties), and order file sections alphabetically.
    pub sort_notes: bool,
    /// Keep note order and content exactly as loaded and omit the
    /// regenerated map section.
    pub preserve_formatting: bool,
}

/// Serialize the whole model to canonical text.
pub fn write(project: Option<&ProjectRoot>, notes: &NoteSet, options: WriteOptions) -> String {
    let mut out = String::new();

    if let Some(project) = project {
        out.push_str(&serialize_project_header(project));
        if !options.preserve_formatting {
            out.push('\n');
            out.push_str(&generate_map(notes));
        }
    }

    let mut written: HashSet<String> = HashSet::new();
    for (file, top_level) in group_notes_by_file(notes, options.sort_notes) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("## ");
        out.push_str(&file);
        out.push('\n');
        for note in top_level {
            serialize_note(note, notes, 0, false, &mut written, &mut out);
        }
    }

    debug!(notes = notes.len(), bytes = out.len(), "serialized project file");
    out
}

/// Render the project header block.
pub fn serialize_project_header(project: &ProjectRoot) -> String {
    let mut out = format!("# {}\n", project.name);
    if let Some(created) = project.created {
        out.push_str(&format!(
            "- created: {}\n",
            created.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }
    for n in &project.notes {
        out.push_str(&format!("- note: {n}\n"));
    }
    out
}

/// Group top-level notes by source file.
///
/// A note is top level when it has no parent, its parent is unknown, or
/// its parent lives in a different file (nesting cannot express those).
/// Notes in a same-file parent cycle are none of those yet are no
/// reachable note's child either; the first-seen member of each cycle is
/// forced top level so the writer never drops notes.
pub fn group_notes_by_file(notes: &NoteSet, sorted: bool) -> Vec<(String, Vec<&Note>)> {
    let mut reachable: HashSet<String> = HashSet::new();
    for note in notes.iter().filter(|n| is_top_level(n, notes)) {
        mark_reachable(note, notes, &mut reachable);
    }

    let mut files: Vec<String> = Vec::new();
    let mut grouped: Vec<(String, Vec<&Note>)> = Vec::new();

    for note in notes.iter() {
        if reachable.contains(note.id()) {
            if !is_top_level(note, notes) {
                continue;
            }
        } else {
            mark_reachable(note, notes, &mut reachable);
        }
        let file = note.props.file.clone().unwrap_or_default();
        match files.iter().position(|f| *f == file) {
            Some(i) => grouped[i].1.push(note),
            None => {
                files.push(file.clone());
                grouped.push((file, vec![note]));
            }
        }
    }

    if sorted {
        grouped.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, group) in &mut grouped {
            // Stable: ties keep document order.
            group.sort_by_key(|n| n.props.line.unwrap_or(u32::MAX));
        }
    }
    grouped
}

fn mark_reachable(note: &Note, notes: &NoteSet, seen: &mut HashSet<String>) {
    if !seen.insert(note.props.id.clone()) {
        return;
    }
    for child in notes.children_of(note.id()) {
        if child.props.file == note.props.file {
            mark_reachable(child, notes, seen);
        }
    }
}

fn is_top_level(note: &Note, notes: &NoteSet) -> bool {
    match &note.props.parent {
        None => true,
        Some(parent) => match notes.get(parent) {
            None => true,
            Some(p) => p.props.file != note.props.file,
        },
    }
}

/// Render one note block at `depth`, recursing into same-file children.
///
/// `written` guards against emitting a note twice; with parent cycles
/// the child recursion would otherwise never terminate.
pub fn serialize_note(
    note: &Note,
    notes: &NoteSet,
    depth: usize,
    parent_implied: bool,
    written: &mut HashSet<String>,
    out: &mut String,
) {
    if !written.insert(note.props.id.clone()) {
        return;
    }
    let indent = "  ".repeat(depth);
    out.push_str(&format!(
        "{indent}- [{}] {}\n",
        note.props.id,
        format_metadata(&note.props)
    ));

    let inner = "  ".repeat(depth + 1);
    if let Some(parent) = &note.props.parent
        && !parent_implied
    {
        out.push_str(&format!("{inner}parent: {parent}\n"));
    }
    if !note.props.related.is_empty() {
        out.push_str(&format!("{inner}related: {}\n", note.props.related.join(", ")));
    }

    serialize_content(note, depth + 1, out);

    for child in notes.children_of(note.id()) {
        if child.props.file == note.props.file {
            serialize_note(child, notes, depth + 1, true, written, out);
        }
    }
}

/// Render the fixed-order metadata segments: author, date, source line,
/// and the type marker for memory notes.
pub fn format_metadata(props: &NoteProperties) -> String {
    let mut segments = vec![props.author.as_str().to_string()];
    if let Some(created) = props.created {
        segments.push(created.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    if let Some(line) = props.line {
        segments.push(format!("line {line}"));
    }
    if props.note_type == NoteType::Memory {
        segments.push(NoteType::Memory.as_str().to_string());
    }
    segments.join(" · ")
}

/// Render content lines indented relative to `base` depth.
pub fn serialize_content(note: &Note, base: usize, out: &mut String) {
    for line in &note.lines {
        let indent = "  ".repeat(base + line.depth);
        out.push_str(&format!("{indent}{}\n", escape_content_line(&line.text)));
    }
}

/// A content line that lexes as a note block start would be re-parsed as
/// a nested note; escape the bracket so it reads back as plain text.
fn escape_content_line(text: &str) -> Cow<'_, str> {
    match text.strip_prefix("- [") {
        Some(rest) if rest.split(']').next().is_some_and(ids::is_valid_id) => {
            Cow::Owned(format!("- \\[{rest}"))
        }
        _ => Cow::Borrowed(text),
    }
}

/// Render the simplified navigable index block.
pub fn generate_map(notes: &NoteSet) -> String {
    let mut out = String::from("## Map\n");
    let mut seen: HashSet<&str> = HashSet::new();
    for note in notes.iter() {
        let file = note.props.file.as_deref().unwrap_or("");
        if seen.insert(file) {
            out.push_str(&format!("- {file}\n"));
            for n in notes.iter().filter(|n| n.props.file.as_deref() == Some(file)) {
                out.push_str(&format!("  - [{}] {}\n", n.props.id, get_summary(n, 60)));
            }
        }
    }
    out
}

/// First content line of the note, truncated for map display.
pub fn get_summary(note: &Note, max_length: usize) -> String {
    let first = note.first_line().unwrap_or("");
    if first.chars().count() <= max_length {
        return first.to_string();
    }
    let truncated: String = first.chars().take(max_length).collect();
    format!("{}...", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::parser::parse;
    use crate::model::{Author, NoteLine};
    use chrono::{TimeZone, Utc};

    fn sample_props(id: &str, file: &str) -> NoteProperties {
        let mut props = NoteProperties::new(id);
        props.file = Some(file.to_string());
        props.created = Some(Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap());
        props
    }

    #[test]
    fn metadata_fixed_order() {
        let mut props = sample_props("cm.abc123", "a.rs");
        props.line = Some(42);
        assert_eq!(format_metadata(&props), "human · 2026-08-30T10:00:00Z · line 42");

        props.note_type = NoteType::Memory;
        props.author = Author::Ai;
        assert_eq!(
            format_metadata(&props),
            "ai · 2026-08-30T10:00:00Z · line 42 · memory"
        );

        props.line = None;
        props.created = None;
        assert_eq!(format_metadata(&props), "ai · memory");
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let mut note = Note::new(sample_props("cm.abc123", "a.rs"));
        note.lines.push(NoteLine::new(0, "short"));
        assert_eq!(get_summary(&note, 60), "short");

        let mut long = Note::new(sample_props("cm.def456", "a.rs"));
        long.lines.push(NoteLine::new(0, "x".repeat(80)));
        let s = get_summary(&long, 10);
        assert_eq!(s, format!("{}...", "x".repeat(10)));
    }

    #[test]
    fn write_groups_and_nests() {
        let mut notes = NoteSet::new();
        let mut parent = Note::new(sample_props("cm.abc123", "src/main.rs"));
        parent.set_content("parent body");
        notes.insert(parent);

        let mut child_props = sample_props("cm.def456", "src/main.rs");
        child_props.parent = Some("cm.abc123".to_string());
        let mut child = Note::new(child_props);
        child.set_content("child body");
        notes.insert(child);

        let mut other = Note::new(sample_props("cm.ghi789", "src/lib.rs"));
        other.set_content("other body");
        notes.insert(other);

        let text = write(None, &notes, WriteOptions::default());
        assert!(text.contains("## src/main.rs\n"));
        assert!(text.contains("## src/lib.rs\n"));
        // Child nested one level deeper than its parent, no parent line.
        assert!(text.contains("\n  - [cm.def456]"));
        assert!(!text.contains("parent: cm.abc123"));
    }

    #[test]
    fn cross_file_child_keeps_parent_property() {
        let mut notes = NoteSet::new();
        notes.insert(Note::new(sample_props("cm.abc123", "a.rs")));
        let mut child_props = sample_props("cm.def456", "b.rs");
        child_props.parent = Some("cm.abc123".to_string());
        notes.insert(Note::new(child_props));

        let text = write(None, &notes, WriteOptions::default());
        assert!(text.contains("## b.rs\n- [cm.def456]"));
        assert!(text.contains("parent: cm.abc123"));

        let reparsed = parse(&text);
        assert_eq!(
            reparsed.notes.get("cm.def456").unwrap().props.parent.as_deref(),
            Some("cm.abc123")
        );
    }

    #[test]
    fn sort_notes_orders_by_line_stable() {
        let mut notes = NoteSet::new();
        let mut a = sample_props("cm.aaa111", "z.rs");
        a.line = Some(90);
        notes.insert(Note::new(a));
        let mut b = sample_props("cm.bbb222", "z.rs");
        b.line = Some(10);
        notes.insert(Note::new(b));
        let mut c = sample_props("cm.ccc333", "a.rs");
        c.line = Some(5);
        notes.insert(Note::new(c));

        let text = write(None, &notes, WriteOptions { sort_notes: true, ..Default::default() });
        let a_pos = text.find("## a.rs").unwrap();
        let z_pos = text.find("## z.rs").unwrap();
        assert!(a_pos < z_pos, "files sorted alphabetically");
        let b_pos = text.find("cm.bbb222").unwrap();
        let a111_pos = text.find("cm.aaa111").unwrap();
        assert!(b_pos < a111_pos, "notes sorted by line within file");
    }

    #[test]
    fn parent_cycle_is_not_dropped() {
        let mut notes = NoteSet::new();
        let mut a = sample_props("cm.aaa111", "a.rs");
        a.parent = Some("cm.bbb222".to_string());
        let mut note_a = Note::new(a);
        note_a.set_content("first of the pair");
        notes.insert(note_a);

        let mut b = sample_props("cm.bbb222", "a.rs");
        b.parent = Some("cm.aaa111".to_string());
        let mut note_b = Note::new(b);
        note_b.set_content("second of the pair");
        notes.insert(note_b);

        let text = write(None, &notes, WriteOptions::default());
        assert!(text.contains("cm.aaa111"));
        assert!(text.contains("cm.bbb222"));
        // The first-seen member carries the parent the nesting cannot
        // express; the other is its nested child.
        assert!(text.contains("parent: cm.bbb222"));

        let reparsed = parse(&text);
        assert!(reparsed.errors.is_empty(), "errors: {:?}", reparsed.errors);
        assert_eq!(reparsed.notes.len(), 2);
        assert_eq!(
            reparsed.notes.get("cm.aaa111").unwrap().props.parent.as_deref(),
            Some("cm.bbb222")
        );
        assert_eq!(
            reparsed.notes.get("cm.bbb222").unwrap().props.parent.as_deref(),
            Some("cm.aaa111")
        );
    }

    #[test]
    fn bullet_shaped_content_line_is_escaped() {
        let mut notes = NoteSet::new();
        let mut n = Note::new(sample_props("cm.abc123", "a.rs"));
        n.set_content("- [cm.def456] quoted bullet");
        notes.insert(n);

        let text = write(None, &notes, WriteOptions::default());
        assert!(text.contains("- \\[cm.def456] quoted bullet"));

        let reparsed = parse(&text);
        assert!(reparsed.errors.is_empty(), "errors: {:?}", reparsed.errors);
        assert_eq!(reparsed.notes.len(), 1);
        assert_eq!(
            reparsed.notes.get("cm.abc123").unwrap().content_text(),
            "- [cm.def456] quoted bullet"
        );
    }

    #[test]
    fn map_lists_files_and_summaries() {
        let mut notes = NoteSet::new();
        let mut n = Note::new(sample_props("cm.abc123", "src/main.rs"));
        n.set_content("entry point");
        notes.insert(n);

        let map = generate_map(&notes);
        assert!(map.starts_with("## Map\n"));
        assert!(map.contains("- src/main.rs\n"));
        assert!(map.contains("  - [cm.abc123] entry point\n"));
    }

    #[test]
    fn header_roundtrips_through_parser() {
        let project = ProjectRoot {
            name: "demo".to_string(),
            created: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            notes: vec!["one".to_string(), "two".to_string()],
        };
        let notes = NoteSet::new();
        let text = write(Some(&project), &notes, WriteOptions::default());

        let reparsed = parse(&text);
        let got = reparsed.project.unwrap();
        assert_eq!(got.name, "demo");
        assert_eq!(got.created, project.created);
        assert_eq!(got.notes, project.notes);
    }
}
