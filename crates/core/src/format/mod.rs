//! On-disk format handling: dialect detection, parsing, serialization.

pub mod parser;
pub mod serializer;

/// Spaces per indentation level in the canonical dialect.
pub const INDENT_WIDTH: usize = 2;

/// The two supported on-disk encodings.
///
/// Canonical is the bullet/indentation dialect and the only one the
/// writer emits. Legacy is the flat property-block dialect, supported
/// read-only for migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Canonical,
    Legacy,
}

/// Classify which dialect `text` is written in.
///
/// A pure function of the whole text: the first structural marker wins.
/// Canonical markers are a markdown heading at column zero or a note
/// bullet; legacy markers are `[project]` or `[cm.xxxxxx]` alone on a
/// line at column zero. Unmarked text defaults to canonical.
pub fn detect_format(text: &str) -> Dialect {
    for line in text.lines() {
        if line.starts_with("# ") || line.starts_with("## ") {
            return Dialect::Canonical;
        }
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("- [")
            && rest.split(']').next().is_some_and(crate::ids::is_valid_id)
        {
            return Dialect::Canonical;
        }
        if !line.starts_with(' ')
            && let Some(inner) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']'))
            && (inner == "project" || crate::ids::is_valid_id(inner))
        {
            return Dialect::Legacy;
        }
    }
    Dialect::Canonical
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_canonical_by_heading() {
        assert_eq!(detect_format("# myproject\n"), Dialect::Canonical);
        assert_eq!(detect_format("## src/main.rs\n"), Dialect::Canonical);
    }

    #[test]
    fn detect_canonical_by_bullet() {
        let text = "- [cm.abc123] human · 2026-01-01T00:00:00Z\n  hello\n";
        assert_eq!(detect_format(text), Dialect::Canonical);
    }

    #[test]
    fn detect_legacy_by_block_header() {
        assert_eq!(detect_format("[project]\nname: x\n"), Dialect::Legacy);
        assert_eq!(detect_format("[cm.abc123]\nfile: a.rs\n"), Dialect::Legacy);
    }

    #[test]
    fn detection_is_stable_on_mixed_cues() {
        // First marker wins, same text always classifies the same way.
        let text = "# proj\n[cm.abc123]\n";
        assert_eq!(detect_format(text), Dialect::Canonical);
        assert_eq!(detect_format(text), Dialect::Canonical);
    }

    #[test]
    fn empty_text_defaults_to_canonical() {
        assert_eq!(detect_format(""), Dialect::Canonical);
        assert_eq!(detect_format("just prose\n"), Dialect::Canonical);
    }
}
