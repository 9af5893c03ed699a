//! Init command: create an empty project file in the current directory.

use codemap_core::NoteStore;
use codemap_core::config::Config;

use crate::InitArgs;

pub fn run(config: &Config, args: InitArgs) {
    let cwd = std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Error resolving current directory: {}", e);
        std::process::exit(1);
    });

    let name = args.name.unwrap_or_else(|| {
        cwd.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    });

    let path = cwd.join(&config.project.file_name);
    match NoteStore::create(&path, &name) {
        Ok(_) => println!("Initialized {} ({})", path.display(), name),
        Err(e) => {
            eprintln!("Error initializing project: {}", e);
            std::process::exit(1);
        }
    }
}
