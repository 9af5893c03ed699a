//! The note store: owns one loaded project file, coordinates parser,
//! writer, link graph and id generator, and persists to disk.
//!
//! All operations are synchronous and run to completion; the store has
//! no internal locking, so concurrent callers must serialize access.
//! The project file is shared with external processes: reload before
//! mutating if outside modification is suspected, since [`NoteStore::save`]
//! is last-writer-wins.

pub mod search;

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::format::parser;
use crate::format::serializer::{self, WriteOptions};
use crate::ids::{self, IdGenerator};
use crate::links::{GraphSnapshot, LinkGraph, note_refs};
use crate::model::{
    Author, Diagnostic, Note, NoteProperties, NoteSet, NoteType, ProjectRoot,
};

pub use search::{MatchSpan, SearchHit};

/// Parameters for [`NoteStore::add_note`].
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub file: String,
    pub content: String,
    pub line: Option<u32>,
    pub parent: Option<String>,
    pub author: Author,
    pub note_type: NoteType,
    /// Explicit id; one is generated when absent.
    pub id: Option<String>,
}

/// Direction an edge was traversed during [`NoteStore::related`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    Forward,
    Backward,
}

/// A note reached by graph traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedNote {
    pub id: String,
    pub path: String,
    /// Hops from the origin note.
    pub depth: usize,
    /// Direction of the edge that first reached this note.
    pub direction: LinkDirection,
}

/// Façade over the loaded model of one project file.
#[derive(Debug)]
pub struct NoteStore {
    path: PathBuf,
    project: Option<ProjectRoot>,
    notes: NoteSet,
    graph: LinkGraph,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    auto_save: bool,
    sort_notes: bool,
    ids: IdGenerator,
}

impl NoteStore {
    /// Load the project file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.exists() {
            return Err(StoreError::FileNotFound(path));
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| StoreError::ReadFailed { path: path.clone(), source: e })?;
        let result = parser::parse(&text);
        info!(
            path = %path.display(),
            notes = result.notes.len(),
            errors = result.errors.len(),
            "opened project file"
        );
        Ok(Self {
            path,
            project: result.project,
            notes: result.notes,
            graph: result.graph,
            errors: result.errors,
            warnings: result.warnings,
            auto_save: true,
            sort_notes: false,
            ids: IdGenerator::default(),
        })
    }

    /// Create a fresh project file at `path` and open it.
    pub fn create(path: impl Into<PathBuf>, name: &str) -> Result<Self, StoreError> {
        let path = path.into();
        if path.exists() {
            return Err(StoreError::WriteFailed {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "project file already exists",
                ),
            });
        }
        let project = ProjectRoot {
            name: name.to_string(),
            created: Some(Utc::now()),
            notes: Vec::new(),
        };
        let text =
            serializer::write(Some(&project), &NoteSet::new(), WriteOptions::default());
        fs::write(&path, text)
            .map_err(|e| StoreError::WriteFailed { path: path.clone(), source: e })?;
        Self::open(path)
    }

    pub fn set_auto_save(&mut self, on: bool) {
        self.auto_save = on;
    }

    pub fn set_sort_notes(&mut self, on: bool) {
        self.sort_notes = on;
    }

    /// Replace the id generator (deterministic ids in tests).
    pub fn set_id_generator(&mut self, generator: IdGenerator) {
        self.ids = generator;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project(&self) -> Option<&ProjectRoot> {
        self.project.as_ref()
    }

    /// Diagnostics from the last parse.
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    // Reads. All are lookups over the in-memory model; none touch disk.

    pub fn get_note(&self, id: &str) -> Option<&Note> {
        self.notes.get(id)
    }

    /// Look up a note by display path. The file and immediate parent in
    /// the path must both match the note's current state.
    pub fn get_note_by_path(&self, path: &str) -> Option<&Note> {
        let parsed = ids::parse_display_path(path)?;
        let note = self.notes.get(&parsed.id)?;
        (note.props.file.as_deref() == Some(parsed.file.as_str())
            && note.props.parent == parsed.parent)
            .then_some(note)
    }

    pub fn all_notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn notes_in_file(&self, file: &str) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.props.file.as_deref() == Some(file)).collect()
    }

    pub fn children(&self, id: &str) -> Vec<&Note> {
        self.notes.children_of(id)
    }

    /// Notes whose content or related list references `id`.
    pub fn backlinks(&self, id: &str) -> Vec<&Note> {
        self.graph
            .backward_links(id)
            .iter()
            .filter_map(|source| self.notes.get(source))
            .collect()
    }

    /// Notes with no backlinks and no parent.
    pub fn orphans(&self) -> Vec<&Note> {
        self.notes
            .iter()
            .filter(|n| {
                self.graph.backlink_count(n.id()) == 0 && n.props.parent.is_none()
            })
            .collect()
    }

    /// Most-referenced notes, descending, document order breaking ties.
    pub fn popular(&self, limit: usize) -> Vec<(&Note, usize)> {
        let mut ranked: Vec<(&Note, usize)> = self
            .notes
            .iter()
            .map(|n| (n, self.graph.backlink_count(n.id())))
            .filter(|(_, count)| *count > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }

    /// Breadth-first traversal of the link graph from `id`, following
    /// both directions, bounded by `depth`. Each reached note is tagged
    /// with its hop count and the direction that first reached it; the
    /// visited set guards against cycles.
    pub fn related(&self, id: &str, depth: usize) -> Result<Vec<RelatedNote>, StoreError> {
        if !self.notes.contains(id) {
            return Err(StoreError::NoteNotFound(id.to_string()));
        }

        let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(id.to_string(), 0)]);
        let mut out = Vec::new();

        while let Some((current, d)) = queue.pop_front() {
            if d >= depth {
                continue;
            }
            let neighbors = self
                .graph
                .forward_links(&current)
                .iter()
                .map(|n| (n.clone(), LinkDirection::Forward))
                .chain(
                    self.graph
                        .backward_links(&current)
                        .iter()
                        .map(|n| (n.clone(), LinkDirection::Backward)),
                );
            for (neighbor, direction) in neighbors {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                let Some(note) = self.notes.get(&neighbor) else {
                    // Dangling reference target; not part of the model.
                    continue;
                };
                out.push(RelatedNote {
                    id: neighbor.clone(),
                    path: note.display_path(),
                    depth: d + 1,
                    direction,
                });
                queue.push_back((neighbor, d + 1));
            }
        }
        Ok(out)
    }

    /// Keyword search over content lines. See [`search::search`].
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        search::search(&self.notes, query, limit)
    }

    /// Immutable snapshot of the link graph, edges carrying the first
    /// source line that mentions the target.
    pub fn link_graph(&self) -> GraphSnapshot {
        self.graph.snapshot(|source, target| {
            self.notes.get(source).and_then(|note| {
                note.lines
                    .iter()
                    .find(|l| l.refs.iter().any(|r| r == target))
                    .map(|l| l.text.clone())
            })
        })
    }

    // Mutations. Each updates the model and the link graph together,
    // then persists when auto-save is enabled.

    /// Add a note. Fails when the parent is unknown, the explicit id is
    /// malformed or taken, or attaching would cycle the parent chain.
    /// Returns the new note's id.
    pub fn add_note(&mut self, new: NewNote) -> Result<String, StoreError> {
        let id = match new.id {
            Some(id) => {
                if !ids::is_valid_id(&id) {
                    return Err(StoreError::InvalidId(id));
                }
                if self.notes.contains(&id) {
                    return Err(StoreError::DuplicateId(id));
                }
                id
            }
            None => {
                let existing: HashSet<String> =
                    self.notes.iter().map(|n| n.id().to_string()).collect();
                self.ids.generate_unique(&existing)
            }
        };

        if let Some(parent) = &new.parent {
            if self.parent_chain_contains(parent, &id) {
                return Err(StoreError::CircularReference(id));
            }
            if !self.notes.contains(parent) {
                return Err(StoreError::ParentNotFound(parent.clone()));
            }
        }

        let mut props = NoteProperties::new(&id);
        props.file = Some(new.file);
        props.line = new.line;
        props.author = new.author;
        props.note_type = new.note_type;
        props.parent = new.parent;
        props.created = Some(Utc::now());

        let mut note = Note::new(props);
        note.set_content(&new.content);

        let affected = self.graph.update_for_note(&note, &[]);
        // The id may already have incoming edges from earlier danglers.
        note.props.backlink_count = self.graph.backlink_count(&id);
        self.notes.insert(note);
        self.refresh_backlink_counts(&affected);

        debug!(id = %id, "added note");
        self.save_if_auto()?;
        Ok(id)
    }

    /// Replace a note's content, apply the link delta, and return the
    /// ids whose backlink set changed.
    pub fn update_note(&mut self, id: &str, content: &str) -> Result<Vec<String>, StoreError> {
        let Some(note) = self.notes.get_mut(id) else {
            return Err(StoreError::NoteNotFound(id.to_string()));
        };
        let old_refs = note_refs(note);
        note.set_content(content);

        let note = self.notes.get(id).expect("note present");
        let affected = self.graph.update_for_note(note, &old_refs);
        self.refresh_backlink_counts(&affected);

        debug!(id = %id, affected = affected.len(), "updated note");
        self.save_if_auto()?;
        Ok(affected)
    }

    /// Delete a note and its descendants. Dangling references from other
    /// notes are left in place; they surface as warnings on reload.
    pub fn delete_note(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.notes.contains(id) {
            return Err(StoreError::NoteNotFound(id.to_string()));
        }
        let subtree = self.notes.subtree_ids(id);
        let mut affected = Vec::new();
        for sid in &subtree {
            affected.extend(self.graph.remove_note(sid));
            self.notes.remove(sid);
        }
        self.refresh_backlink_counts(&affected);

        debug!(id = %id, removed = subtree.len(), "deleted note");
        self.save_if_auto()?;
        Ok(())
    }

    /// Move a note to another file/line. The link graph is untouched;
    /// the returned display path is recomputed from the new location.
    pub fn move_note(
        &mut self,
        id: &str,
        file: &str,
        line: Option<u32>,
    ) -> Result<String, StoreError> {
        let Some(note) = self.notes.get_mut(id) else {
            return Err(StoreError::NoteNotFound(id.to_string()));
        };
        note.props.file = Some(file.to_string());
        note.props.line = line;
        let path = note.display_path();

        debug!(id = %id, file = %file, "moved note");
        self.save_if_auto()?;
        Ok(path)
    }

    /// Serialize and persist the current model.
    ///
    /// Last-writer-wins: if the file changed on disk since loading, that
    /// change is overwritten. Callers suspecting external modification
    /// should [`NoteStore::reload`] before mutating.
    pub fn save(&self) -> Result<(), StoreError> {
        let options =
            WriteOptions { sort_notes: self.sort_notes, preserve_formatting: false };
        let text = serializer::write(self.project.as_ref(), &self.notes, options);
        fs::write(&self.path, text)
            .map_err(|e| StoreError::WriteFailed { path: self.path.clone(), source: e })?;
        info!(path = %self.path.display(), notes = self.notes.len(), "saved project file");
        Ok(())
    }

    /// Discard the in-memory model and re-parse from disk. Unsaved
    /// mutations are lost.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let fresh = Self::open(self.path.clone())?;
        self.project = fresh.project;
        self.notes = fresh.notes;
        self.graph = fresh.graph;
        self.errors = fresh.errors;
        self.warnings = fresh.warnings;
        Ok(())
    }

    fn save_if_auto(&self) -> Result<(), StoreError> {
        if self.auto_save { self.save() } else { Ok(()) }
    }

    /// True when walking the parent chain upward from `start` reaches `id`.
    fn parent_chain_contains(&self, start: &str, id: &str) -> bool {
        let mut current = Some(start.to_string());
        let mut seen = HashSet::new();
        while let Some(cur) = current {
            if cur == id {
                return true;
            }
            if !seen.insert(cur.clone()) {
                return true;
            }
            current = self
                .notes
                .get(&cur)
                .and_then(|n| n.props.parent.clone());
        }
        false
    }

    fn refresh_backlink_counts(&mut self, changed: &[String]) {
        for id in changed {
            let count = self.graph.backlink_count(id);
            if let Some(note) = self.notes.get_mut(id) {
                note.props.backlink_count = count;
            }
        }
    }
}
