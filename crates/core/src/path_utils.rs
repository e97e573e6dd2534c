//! Path utilities for Folderbell
//!
//! Handles tilde expansion and keeps subscription paths confined to the files root.

use std::path::{Component, Path, PathBuf};

/// Expands a leading tilde (~) to the user's home directory.
/// "~/files" -> "/home/alice/files", "/srv/files" -> "/srv/files" (no change)
pub fn expand_tilde(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            format!("{}/{}", home, rest)
        }
        None => path.to_string(),
    }
}

/// Helper to convert a potentially tilde-containing string into a PathBuf.
pub fn get_path(path: &str) -> PathBuf {
    PathBuf::from(expand_tilde(path))
}

/// Joins a stored subscription path onto the files root.
///
/// Returns `None` when the relative path is absolute or climbs out of the root,
/// so a tampered database row can never point the detector elsewhere.
pub fn resolve_under(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Renders folder segments as the `/`-separated form stored in the database.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("/")
}

/// Last segment of a stored path, used as the human name of a folder.
pub fn folder_name(relative: &str) -> &str {
    relative.rsplit('/').find(|s| !s.is_empty()).unwrap_or(relative)
}
