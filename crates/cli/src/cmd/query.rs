//! Read-only commands: list, show, search, backlinks, orphans, popular,
//! related, graph.

use std::path::Path;

use codemap_core::config::Config;
use codemap_core::model::Note;

use super::output::{note_block, note_line, print_json};
use crate::{RelatedArgs, SearchArgs};

fn print_notes(notes: &[&Note], json: bool) {
    if json {
        print_json(&notes);
        return;
    }
    if notes.is_empty() {
        println!("(no notes)");
        return;
    }
    for note in notes {
        println!("{}", note_line(note));
    }
}

pub fn list(config: &Config, file: Option<&Path>, json: bool, args: crate::ListArgs) {
    let store = super::open_store(config, file);
    let notes: Vec<&Note> = match &args.in_file {
        Some(f) => store.notes_in_file(f),
        None => store.all_notes().collect(),
    };
    print_notes(&notes, json);
}

pub fn show(config: &Config, file: Option<&Path>, json: bool, target: &str) {
    let store = super::open_store(config, file);
    let note = store
        .get_note(target)
        .or_else(|| store.get_note_by_path(target));
    match note {
        Some(note) => {
            if json {
                print_json(note);
            } else {
                print!("{}", note_block(note));
                let children = store.children(note.id());
                if !children.is_empty() {
                    println!("children:");
                    for child in children {
                        println!("  {}", note_line(child));
                    }
                }
            }
        }
        None => {
            eprintln!("Note not found: {}", target);
            std::process::exit(1);
        }
    }
}

pub fn search(config: &Config, file: Option<&Path>, json: bool, args: SearchArgs) {
    let store = super::open_store(config, file);
    let hits = store.search(&args.query, args.limit);
    if json {
        print_json(&hits);
        return;
    }
    if hits.is_empty() {
        println!("(no matches)");
        return;
    }
    for hit in hits {
        println!("{:5.1}  {}  {}", hit.score, hit.path, hit.snippet);
    }
}

pub fn backlinks(config: &Config, file: Option<&Path>, json: bool, id: &str) {
    let store = super::open_store(config, file);
    if store.get_note(id).is_none() {
        eprintln!("Note not found: {}", id);
        std::process::exit(1);
    }
    print_notes(&store.backlinks(id), json);
}

pub fn orphans(config: &Config, file: Option<&Path>, json: bool) {
    let store = super::open_store(config, file);
    print_notes(&store.orphans(), json);
}

pub fn popular(config: &Config, file: Option<&Path>, json: bool, limit: usize) {
    let store = super::open_store(config, file);
    let ranked = store.popular(limit);
    if json {
        let rows: Vec<serde_json::Value> = ranked
            .iter()
            .map(|(note, count)| {
                serde_json::json!({ "id": note.id(), "path": note.display_path(), "backlinks": count })
            })
            .collect();
        print_json(&rows);
        return;
    }
    if ranked.is_empty() {
        println!("(no referenced notes)");
        return;
    }
    for (note, count) in ranked {
        println!("{:4}  {}", count, note_line(note));
    }
}

pub fn related(config: &Config, file: Option<&Path>, json: bool, args: RelatedArgs) {
    let store = super::open_store(config, file);
    match store.related(&args.id, args.depth) {
        Ok(related) => {
            if json {
                print_json(&related);
                return;
            }
            if related.is_empty() {
                println!("(no related notes)");
                return;
            }
            for r in related {
                let arrow = match r.direction {
                    codemap_core::store::LinkDirection::Forward => "->",
                    codemap_core::store::LinkDirection::Backward => "<-",
                };
                println!("{:2}  {}  {}", r.depth, arrow, r.path);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn graph(config: &Config, file: Option<&Path>) {
    let store = super::open_store(config, file);
    print_json(&store.link_graph());
}
