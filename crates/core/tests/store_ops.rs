//! Store persistence tests over a real temporary project file.

use std::fs;

use codemap_core::NoteStore;
use codemap_core::ids::IdGenerator;
use codemap_core::store::NewNote;
use tempfile::tempdir;

const FIXTURE: &str = "\
# demo

## src/main.rs
- [cm.abc123] human · 2026-08-30T10:00:00Z · line 42
  references [cm.def456] here

## src/lib.rs
- [cm.def456] ai · 2026-08-30T11:00:00Z
  the target note
";

fn fixture_store(dir: &tempfile::TempDir) -> NoteStore {
    let path = dir.path().join("codemap.md");
    fs::write(&path, FIXTURE).unwrap();
    let mut store = NoteStore::open(&path).unwrap();
    store.set_id_generator(IdGenerator::with_seed(9));
    store
}

#[test]
fn create_then_open_empty_project() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("codemap.md");

    let store = NoteStore::create(&path, "fresh").unwrap();
    assert_eq!(store.project().unwrap().name, "fresh");
    assert_eq!(store.note_count(), 0);

    // Creating over an existing file is refused.
    assert!(NoteStore::create(&path, "again").is_err());
}

#[test]
fn auto_save_persists_each_mutation() {
    let tmp = tempdir().unwrap();
    let mut store = fixture_store(&tmp);

    let id = store
        .add_note(NewNote {
            file: "src/extra.rs".to_string(),
            content: "persisted content".to_string(),
            ..Default::default()
        })
        .unwrap();

    let reopened = NoteStore::open(store.path()).unwrap();
    assert!(reopened.get_note(&id).is_some());
    assert!(reopened
        .notes_in_file("src/extra.rs")
        .iter()
        .any(|n| n.first_line() == Some("persisted content")));
}

#[test]
fn explicit_save_when_auto_save_off() {
    let tmp = tempdir().unwrap();
    let mut store = fixture_store(&tmp);
    store.set_auto_save(false);

    store.update_note("cm.def456", "rewritten body").unwrap();

    let on_disk = NoteStore::open(store.path()).unwrap();
    assert_eq!(
        on_disk.get_note("cm.def456").unwrap().first_line(),
        Some("the target note"),
        "disk unchanged before save"
    );

    store.save().unwrap();
    let on_disk = NoteStore::open(store.path()).unwrap();
    assert_eq!(on_disk.get_note("cm.def456").unwrap().first_line(), Some("rewritten body"));
}

#[test]
fn reload_discards_unsaved_mutations() {
    let tmp = tempdir().unwrap();
    let mut store = fixture_store(&tmp);
    store.set_auto_save(false);

    store.delete_note("cm.def456").unwrap();
    assert!(store.get_note("cm.def456").is_none());

    store.reload().unwrap();
    assert!(store.get_note("cm.def456").is_some());
    assert_eq!(store.get_note("cm.def456").unwrap().props.backlink_count, 1);
}

#[test]
fn deleting_target_leaves_dangling_warning_on_reload() {
    let tmp = tempdir().unwrap();
    let mut store = fixture_store(&tmp);

    // Auto-save on: the deletion is persisted, cm.abc123 still mentions
    // cm.def456 in its content.
    store.delete_note("cm.def456").unwrap();

    let reopened = NoteStore::open(store.path()).unwrap();
    assert!(reopened.get_note("cm.def456").is_none());
    assert!(
        reopened
            .warnings()
            .iter()
            .any(|w| w.message.contains("cm.def456")),
        "dangling reference should warn on reload: {:?}",
        reopened.warnings()
    );
}

#[test]
fn update_then_reload_keeps_graph_consistent() {
    let tmp = tempdir().unwrap();
    let mut store = fixture_store(&tmp);

    let affected = store.update_note("cm.abc123", "no more references").unwrap();
    assert_eq!(affected, vec!["cm.def456"]);

    let reopened = NoteStore::open(store.path()).unwrap();
    assert_eq!(reopened.get_note("cm.def456").unwrap().props.backlink_count, 0);
    assert!(reopened.backlinks("cm.def456").is_empty());
    // cm.def456 is now an orphan: no backlinks, no parent.
    assert!(reopened.orphans().iter().any(|n| n.id() == "cm.def456"));
}

#[test]
fn bullet_shaped_content_survives_save_reload() {
    let tmp = tempdir().unwrap();
    let mut store = fixture_store(&tmp);

    let id = store
        .add_note(NewNote {
            file: "src/main.rs".to_string(),
            content: "- [cm.def456] looks like a bullet".to_string(),
            ..Default::default()
        })
        .unwrap();

    let reopened = NoteStore::open(store.path()).unwrap();
    assert!(reopened.errors().is_empty(), "reload errors: {:?}", reopened.errors());
    assert_eq!(reopened.note_count(), 3);
    assert_eq!(
        reopened.get_note(&id).unwrap().content_text(),
        "- [cm.def456] looks like a bullet"
    );
    // The reference inside the quoted line still counts as a backlink,
    // alongside the one from cm.abc123.
    assert_eq!(reopened.backlinks("cm.def456").len(), 2);
}
