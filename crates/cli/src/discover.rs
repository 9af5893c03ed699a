//! Project file discovery.
//!
//! The project file is found by walking parent directories from a
//! starting point, the way version-control roots are located. The file
//! name comes from configuration (`codemap.md` by default).

use std::path::{Path, PathBuf};

/// Walk `start` and its ancestors looking for `file_name`.
pub fn find_project_file(start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}
