// Document store: the only layer that touches the notes directory
//
// Every call reflects on-disk truth at call time. Implementations hold no
// cached state, so they can sit behind a process boundary with arbitrary
// latency.

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::models::FileNode;

mod local;
#[cfg(test)]
pub(crate) mod memory;

pub use local::LocalStore;

pub type StoreFuture<'a, T> = BoxFuture<'a, StoreResult<T>>;

/// A subdirectory that could not be read during a scan
#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: StoreError,
}

/// Result of a recursive listing: unreadable subtrees show up empty and
/// are reported in `failures`
#[derive(Debug, Default)]
pub struct TreeScan {
    pub nodes: Vec<FileNode>,
    pub failures: Vec<ScanFailure>,
}

pub trait DocumentStore: Send + Sync {
    /// Recursive listing of `root`, creating it first when missing.
    /// Files are filtered to the note extension; folders are always kept.
    fn list_tree<'a>(&'a self, root: &'a Path) -> StoreFuture<'a, TreeScan>;

    fn read_file<'a>(&'a self, path: &'a Path) -> StoreFuture<'a, String>;

    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> StoreFuture<'a, ()>;

    /// Create the first free `Untitled.md`, `Untitled (1).md`, ... in `parent`.
    fn create_file<'a>(&'a self, parent: &'a Path) -> StoreFuture<'a, PathBuf>;

    /// Create the first free `New Folder`, `New Folder (1)`, ... in `parent`.
    fn create_folder<'a>(&'a self, parent: &'a Path) -> StoreFuture<'a, PathBuf>;

    /// Remove a file or a whole directory.
    fn delete_path<'a>(&'a self, path: &'a Path) -> StoreFuture<'a, ()>;

    /// Rename `src` to `dest`. Never overwrites: an existing `dest` is a
    /// `Conflict` and leaves the file system untouched.
    fn move_path<'a>(&'a self, src: &'a Path, dest: &'a Path) -> StoreFuture<'a, ()>;
}

/// Upper bound on `Untitled (n)` probes before giving up.
pub(crate) const MAX_NAME_PROBES: usize = 10_000;
