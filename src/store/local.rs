// Local file-system implementation of the document store

use std::io;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use tokio::fs;
use walkdir::WalkDir;

use super::{DocumentStore, MAX_NAME_PROBES, ScanFailure, StoreFuture, TreeScan};
use crate::error::{StoreError, StoreResult};
use crate::models::FileNode;
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Folder,
}

/// Document store backed by a directory on disk
#[derive(Debug, Clone)]
pub struct LocalStore {
    extension: String,
}

impl LocalStore {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    async fn scan(&self, root: &Path) -> StoreResult<TreeScan> {
        fs::create_dir_all(root)
            .await
            .map_err(|e| StoreError::from_io(root, e))?;

        let root_buf = root.to_path_buf();
        let extension = self.extension.clone();
        tokio::task::spawn_blocking(move || scan_tree(&root_buf, &extension))
            .await
            .map_err(|e| StoreError::Io {
                path: root.to_path_buf(),
                source: io::Error::other(e),
            })
    }

    async fn create_unique(&self, parent: &Path, kind: EntryKind) -> StoreResult<PathBuf> {
        let meta = fs::metadata(parent)
            .await
            .map_err(|e| StoreError::from_io(parent, e))?;
        if !meta.is_dir() {
            return Err(StoreError::NotFound(parent.to_path_buf()));
        }

        for attempt in 0..MAX_NAME_PROBES {
            let name = match kind {
                EntryKind::File => {
                    paths::candidate_name(paths::UNTITLED_NOTE, Some(&self.extension), attempt)
                }
                EntryKind::Folder => paths::candidate_name(paths::NEW_FOLDER, None, attempt),
            };
            let candidate = parent.join(name);

            // Exclusive create: a name taken since the last probe just
            // moves us on to the next candidate.
            let created = match kind {
                EntryKind::File => fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&candidate)
                    .await
                    .map(drop),
                EntryKind::Folder => fs::create_dir(&candidate).await,
            };

            match created {
                Ok(()) => {
                    tracing::info!(path = %candidate.display(), "created entry");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StoreError::from_io(&candidate, e)),
            }
        }

        Err(StoreError::Conflict(parent.to_path_buf()))
    }

    async fn remove(&self, path: &Path) -> StoreResult<()> {
        let meta = fs::symlink_metadata(path)
            .await
            .map_err(|e| StoreError::from_io(path, e))?;
        let result = if meta.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        result.map_err(|e| StoreError::from_io(path, e))
    }

    async fn rename(&self, src: &Path, dest: &Path) -> StoreResult<()> {
        if fs::symlink_metadata(src).await.is_err() {
            return Err(StoreError::NotFound(src.to_path_buf()));
        }
        if dest != src && dest.starts_with(src) {
            return Err(StoreError::InvalidMove(src.to_path_buf()));
        }
        let dest_exists = fs::try_exists(dest)
            .await
            .map_err(|e| StoreError::from_io(dest, e))?;
        if dest_exists && !same_entry(src, dest).await {
            return Err(StoreError::Conflict(dest.to_path_buf()));
        }

        fs::rename(src, dest)
            .await
            .map_err(|e| StoreError::from_io(src, e))
    }
}

impl DocumentStore for LocalStore {
    fn list_tree<'a>(&'a self, root: &'a Path) -> StoreFuture<'a, TreeScan> {
        self.scan(root).boxed()
    }

    fn read_file<'a>(&'a self, path: &'a Path) -> StoreFuture<'a, String> {
        async move {
            fs::read_to_string(path)
                .await
                .map_err(|e| StoreError::from_io(path, e))
        }
        .boxed()
    }

    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> StoreFuture<'a, ()> {
        async move {
            fs::write(path, content)
                .await
                .map_err(|e| StoreError::from_io(path, e))
        }
        .boxed()
    }

    fn create_file<'a>(&'a self, parent: &'a Path) -> StoreFuture<'a, PathBuf> {
        self.create_unique(parent, EntryKind::File).boxed()
    }

    fn create_folder<'a>(&'a self, parent: &'a Path) -> StoreFuture<'a, PathBuf> {
        self.create_unique(parent, EntryKind::Folder).boxed()
    }

    fn delete_path<'a>(&'a self, path: &'a Path) -> StoreFuture<'a, ()> {
        self.remove(path).boxed()
    }

    fn move_path<'a>(&'a self, src: &'a Path, dest: &'a Path) -> StoreFuture<'a, ()> {
        self.rename(src, dest).boxed()
    }
}

// ============================================
// TREE SCAN
// ============================================

/// Walk `root` depth-first and fold the flat walk back into nested nodes.
/// Symlinks are not followed and not listed.
fn scan_tree(root: &Path, extension: &str) -> TreeScan {
    let mut failures = Vec::new();
    // One frame per open directory; frame 0 is the root.
    let mut stack: Vec<(PathBuf, Vec<FileNode>)> = vec![(root.to_path_buf(), Vec::new())];

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                failures.push(walk_failure(err, root));
                continue;
            }
        };

        while stack.len() > entry.depth() {
            close_frame(&mut stack);
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            stack.push((entry.into_path(), Vec::new()));
        } else if file_type.is_file() {
            let name = entry.file_name().to_string_lossy();
            if paths::has_extension(&name, extension) {
                if let Some((_, siblings)) = stack.last_mut() {
                    siblings.push(FileNode::file(entry.path()));
                }
            }
        }
    }

    while stack.len() > 1 {
        close_frame(&mut stack);
    }
    let nodes = stack.pop().map(|(_, nodes)| nodes).unwrap_or_default();

    for failure in &failures {
        tracing::warn!(path = %failure.path.display(), error = %failure.error, "unreadable directory skipped");
    }

    TreeScan { nodes, failures }
}

fn close_frame(stack: &mut Vec<(PathBuf, Vec<FileNode>)>) {
    if let Some((path, children)) = stack.pop() {
        if let Some((_, parent)) = stack.last_mut() {
            parent.push(FileNode::folder(path, children));
        }
    }
}

/// True when `a` and `b` differ only in letter case and resolve to the
/// same entry, as a case-only rename does on a case-insensitive volume.
async fn same_entry(a: &Path, b: &Path) -> bool {
    if a.to_string_lossy().to_lowercase() != b.to_string_lossy().to_lowercase() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        match (fs::symlink_metadata(a).await, fs::symlink_metadata(b).await) {
            (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
            _ => false,
        }
    }
    #[cfg(not(unix))]
    {
        match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

fn walk_failure(err: walkdir::Error, root: &Path) -> ScanFailure {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("file system loop"));
    ScanFailure {
        error: StoreError::from_io(&path, source),
        path,
    }
}
