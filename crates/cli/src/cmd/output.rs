//! Shared printing helpers.

use codemap_core::model::Note;

/// One-line summary for listings: path, metadata, first content line.
pub fn note_line(note: &Note) -> String {
    let mut line = note.display_path();
    if let Some(n) = note.props.line {
        line.push_str(&format!(":{}", n));
    }
    if let Some(first) = note.first_line() {
        line.push_str("  ");
        line.push_str(first);
    }
    line
}

/// Full block for `show`: metadata then indented content.
pub fn note_block(note: &Note) -> String {
    let mut out = format!(
        "{}\nauthor: {} · type: {}",
        note.display_path(),
        note.props.author.as_str(),
        note.props.note_type.as_str(),
    );
    if let Some(created) = note.props.created {
        out.push_str(&format!(" · created: {}", created.to_rfc3339()));
    }
    if note.props.backlink_count > 0 {
        out.push_str(&format!(" · backlinks: {}", note.props.backlink_count));
    }
    if !note.props.related.is_empty() {
        out.push_str(&format!("\nrelated: {}", note.props.related.join(", ")));
    }
    out.push('\n');
    for line in &note.lines {
        out.push_str(&format!("  {}{}\n", "  ".repeat(line.depth), line.text));
    }
    out
}

pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            std::process::exit(1);
        }
    }
}
