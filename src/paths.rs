// Path helpers: names, titles, unique-name candidates, retargeting

use std::path::{Path, PathBuf};

pub const UNTITLED_NOTE: &str = "Untitled";
pub const NEW_FOLDER: &str = "New Folder";

/// Last path segment, or the whole path when it has none (e.g. `/`).
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// True when `name` ends with `.{extension}`.
pub fn has_extension(name: &str, extension: &str) -> bool {
    name.len() > extension.len() + 1
        && name.ends_with(extension)
        && name[..name.len() - extension.len()].ends_with('.')
}

/// Display title of a note: its file name without the note extension.
pub fn title_for(path: &Path, extension: &str) -> String {
    let name = file_name(path);
    if has_extension(&name, extension) {
        name[..name.len() - extension.len() - 1].to_string()
    } else {
        name
    }
}

/// Candidate names for unique creation:
/// `Untitled.md`, `Untitled (1).md`, `Untitled (2).md`, ...
pub fn candidate_name(stem: &str, extension: Option<&str>, attempt: usize) -> String {
    let base = if attempt == 0 {
        stem.to_string()
    } else {
        format!("{stem} ({attempt})")
    };
    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

/// `path` equals `ancestor` or lives somewhere below it.
pub fn is_within(path: &Path, ancestor: &Path) -> bool {
    path.starts_with(ancestor)
}

/// Where `path` ends up after `from` is moved to `to`, if it is affected.
pub fn retarget(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    if path == from {
        return Some(to.to_path_buf());
    }
    path.strip_prefix(from).ok().map(|suffix| to.join(suffix))
}
