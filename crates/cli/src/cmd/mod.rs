pub mod edit;
pub mod init;
pub mod output;
pub mod query;

use std::path::{Path, PathBuf};

use codemap_core::NoteStore;
use codemap_core::config::Config;

use crate::discover;

/// Resolve the project file: explicit override first, discovery second.
pub fn resolve_project_file(config: &Config, file: Option<&Path>) -> PathBuf {
    if let Some(f) = file {
        return f.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Error resolving current directory: {}", e);
        std::process::exit(1);
    });
    match discover::find_project_file(&cwd, &config.project.file_name) {
        Some(path) => path,
        None => {
            eprintln!(
                "No {} found here or in any parent directory.",
                config.project.file_name
            );
            eprintln!("Hint: run 'cmap init' to start a project.");
            std::process::exit(1);
        }
    }
}

/// Open the store with the configured behaviour, exiting on failure.
pub fn open_store(config: &Config, file: Option<&Path>) -> NoteStore {
    let path = resolve_project_file(config, file);
    match NoteStore::open(&path) {
        Ok(mut store) => {
            store.set_auto_save(config.store.auto_save);
            store.set_sort_notes(config.store.sort_notes);
            store
        }
        Err(e) => {
            eprintln!("Error opening project file: {}", e);
            std::process::exit(1);
        }
    }
}
