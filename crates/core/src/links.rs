//! Forward/backward link adjacency derived from note content.
//!
//! The graph is the single source of truth for links. Forward links are
//! first-occurrence-ordered, deduplicated target lists; backward links
//! are maintained as the exact transpose. A reference appearing twice in
//! one note therefore counts once toward the target's backlink count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Note;

/// Ordered, deduplicated references of one note: inline content
/// references first, then the `related` property.
pub fn note_refs(note: &Note) -> Vec<String> {
    let mut refs = Vec::new();
    for line in &note.lines {
        for r in &line.refs {
            if !refs.contains(r) {
                refs.push(r.clone());
            }
        }
    }
    for r in &note.props.related {
        if !refs.contains(r) {
            refs.push(r.clone());
        }
    }
    refs
}

/// One edge in a graph snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Text of the first source line mentioning the target, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Immutable view of the link graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
}

/// Maintained forward/backward adjacency.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    forward: BTreeMap<String, Vec<String>>,
    backward: BTreeMap<String, Vec<String>>,
}

impl LinkGraph {
    /// Recompute the whole adjacency from scratch. Cost is proportional
    /// to total content size; used on full (re)load.
    pub fn rebuild_all<'a>(notes: impl Iterator<Item = &'a Note>) -> Self {
        let mut graph = Self::default();
        for note in notes {
            for target in note_refs(note) {
                graph.add_edge(note.id(), &target);
            }
        }
        debug!(edges = graph.edge_count(), "rebuilt link graph");
        graph
    }

    fn add_edge(&mut self, source: &str, target: &str) -> bool {
        let targets = self.forward.entry(source.to_string()).or_default();
        if targets.iter().any(|t| t == target) {
            return false;
        }
        targets.push(target.to_string());
        self.backward.entry(target.to_string()).or_default().push(source.to_string());
        true
    }

    fn remove_edge(&mut self, source: &str, target: &str) -> bool {
        let Some(targets) = self.forward.get_mut(source) else { return false };
        let Some(pos) = targets.iter().position(|t| t == target) else { return false };
        targets.remove(pos);
        if targets.is_empty() {
            self.forward.remove(source);
        }
        if let Some(sources) = self.backward.get_mut(target) {
            sources.retain(|s| s != source);
            if sources.is_empty() {
                self.backward.remove(target);
            }
        }
        true
    }

    /// Apply the reference delta after a note's content changed.
    ///
    /// `old_refs` is the deduplicated reference list before the edit and
    /// `note` carries the new content. Returns the ids whose backward
    /// link set changed, so cached backlink counts can be refreshed.
    pub fn update_for_note(&mut self, note: &Note, old_refs: &[String]) -> Vec<String> {
        let new_refs = note_refs(note);
        let mut affected = Vec::new();

        for stale in old_refs.iter().filter(|r| !new_refs.contains(r)) {
            if self.remove_edge(note.id(), stale) && !affected.contains(stale) {
                affected.push(stale.clone());
            }
        }
        for fresh in new_refs.iter().filter(|r| !old_refs.contains(r)) {
            if self.add_edge(note.id(), fresh) && !affected.contains(fresh) {
                affected.push(fresh.clone());
            }
        }
        affected
    }

    /// Drop `id` as both a source and a target. Returns the ids that
    /// lost an incoming edge.
    pub fn remove_note(&mut self, id: &str) -> Vec<String> {
        let targets = self.forward.remove(id).unwrap_or_default();
        for target in &targets {
            if let Some(sources) = self.backward.get_mut(target) {
                sources.retain(|s| s != id);
                if sources.is_empty() {
                    self.backward.remove(target);
                }
            }
        }

        let sources = self.backward.remove(id).unwrap_or_default();
        for source in &sources {
            if let Some(t) = self.forward.get_mut(source) {
                t.retain(|x| x != id);
                if t.is_empty() {
                    self.forward.remove(source);
                }
            }
        }

        targets
    }

    /// Forward link targets of `id`, in insertion order. O(1) lookup,
    /// never a rescan.
    pub fn forward_links(&self, id: &str) -> &[String] {
        self.forward.get(id).map_or(&[][..], Vec::as_slice)
    }

    /// Backward link sources of `id`, in insertion order.
    pub fn backward_links(&self, id: &str) -> &[String] {
        self.backward.get(id).map_or(&[][..], Vec::as_slice)
    }

    pub fn backlink_count(&self, id: &str) -> usize {
        self.backward.get(id).map_or(0, Vec::len)
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }

    /// Immutable snapshot. When a context lookup is supplied it provides
    /// the surrounding text for each edge.
    pub fn snapshot(
        &self,
        context: impl Fn(&str, &str) -> Option<String>,
    ) -> GraphSnapshot {
        let mut nodes: Vec<String> = self
            .forward
            .keys()
            .chain(self.backward.keys())
            .cloned()
            .collect();
        nodes.sort();
        nodes.dedup();

        let context = &context;
        let edges = self
            .forward
            .iter()
            .flat_map(|(source, targets)| {
                targets.iter().map(move |target| GraphEdge {
                    source: source.clone(),
                    target: target.clone(),
                    context: context(source, target),
                })
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }

    /// Transpose check: every forward edge has its backward mirror and
    /// vice versa. Used by tests and debug assertions.
    pub fn is_symmetric(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(s, targets)| {
            targets.iter().all(|t| self.backward_links(t).contains(s))
        });
        let backward_ok = self.backward.iter().all(|(t, sources)| {
            sources.iter().all(|s| self.forward_links(s).contains(t))
        });
        forward_ok && backward_ok
    }
}
