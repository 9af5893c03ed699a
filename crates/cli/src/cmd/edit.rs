//! Mutating commands: add, update, delete, move, migrate.

use std::path::Path;

use codemap_core::config::Config;
use codemap_core::model::{Author, NoteType};
use codemap_core::store::NewNote;

use crate::{AddArgs, MoveArgs};

pub fn add(config: &Config, file: Option<&Path>, args: AddArgs) {
    let Some(author) = Author::from_str(&args.author) else {
        eprintln!("Invalid author '{}': expected human or ai", args.author);
        std::process::exit(1);
    };
    let Some(note_type) = NoteType::from_str(&args.note_type) else {
        eprintln!("Invalid type '{}': expected note or memory", args.note_type);
        std::process::exit(1);
    };

    let mut store = super::open_store(config, file);
    let new = NewNote {
        file: args.to,
        content: args.content.replace("\\n", "\n"),
        line: args.line,
        parent: args.parent,
        author,
        note_type,
        id: None,
    };
    match store.add_note(new) {
        Ok(id) => {
            let path = store.get_note(&id).map(|n| n.display_path()).unwrap_or_default();
            println!("Added {} ({})", id, path);
        }
        Err(e) => {
            eprintln!("Error adding note: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn update(config: &Config, file: Option<&Path>, id: &str, content: &str) {
    let mut store = super::open_store(config, file);
    match store.update_note(id, &content.replace("\\n", "\n")) {
        Ok(affected) => {
            println!("Updated {}", id);
            if !affected.is_empty() {
                println!("Backlinks changed for: {}", affected.join(", "));
            }
        }
        Err(e) => {
            eprintln!("Error updating note: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn delete(config: &Config, file: Option<&Path>, id: &str) {
    let mut store = super::open_store(config, file);
    match store.delete_note(id) {
        Ok(()) => println!("Deleted {}", id),
        Err(e) => {
            eprintln!("Error deleting note: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn move_note(config: &Config, file: Option<&Path>, args: MoveArgs) {
    let mut store = super::open_store(config, file);
    match store.move_note(&args.id, &args.to, args.line) {
        Ok(path) => println!("Moved {} to {}", args.id, path),
        Err(e) => {
            eprintln!("Error moving note: {}", e);
            std::process::exit(1);
        }
    }
}

/// Parse the file (either dialect) and rewrite it canonically.
pub fn migrate(config: &Config, file: Option<&Path>) {
    let store = super::open_store(config, file);
    if !store.errors().is_empty() {
        eprintln!("Refusing to migrate a file with parse errors:");
        for e in store.errors() {
            eprintln!("  {:?}: {}", e.kind, e.message);
        }
        std::process::exit(1);
    }
    match store.save() {
        Ok(()) => println!(
            "Rewrote {} canonically ({} notes)",
            store.path().display(),
            store.note_count()
        ),
        Err(e) => {
            eprintln!("Error writing project file: {}", e);
            std::process::exit(1);
        }
    }
}
