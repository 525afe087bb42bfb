// In-memory document store for tests: injectable latency and failures,
// plus a log of every write that reached the "disk"

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;

use super::{DocumentStore, MAX_NAME_PROBES, ScanFailure, StoreFuture, TreeScan};
use crate::error::{StoreError, StoreResult};
use crate::models::FileNode;
use crate::paths;

#[derive(Debug, Clone)]
enum Entry {
    File(String),
    Dir,
}

#[derive(Default)]
struct State {
    entries: BTreeMap<PathBuf, Entry>,
    writes: Vec<(PathBuf, String)>,
    write_delay: Duration,
    read_delays: HashMap<PathBuf, Duration>,
    failing_writes: HashSet<PathBuf>,
    delete_delay: Duration,
    failing_deletes: HashSet<PathBuf>,
    failing_dirs: HashSet<PathBuf>,
}

pub(crate) struct MemoryStore {
    extension: String,
    state: Mutex<State>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            extension: "md".to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub(crate) fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        self.state.lock().entries.insert(path.into(), Entry::Dir);
        self
    }

    pub(crate) fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.state
            .lock()
            .entries
            .insert(path.into(), Entry::File(content.to_string()));
        self
    }

    pub(crate) fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        match self.state.lock().entries.get(path.as_ref()) {
            Some(Entry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub(crate) fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.state.lock().entries.contains_key(path.as_ref())
    }

    pub(crate) fn writes(&self) -> Vec<(PathBuf, String)> {
        self.state.lock().writes.clone()
    }

    pub(crate) fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = delay;
    }

    pub(crate) fn set_read_delay(&self, path: impl Into<PathBuf>, delay: Duration) {
        self.state.lock().read_delays.insert(path.into(), delay);
    }

    pub(crate) fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing_writes.insert(path.into());
    }

    pub(crate) fn heal_writes(&self) {
        self.state.lock().failing_writes.clear();
    }

    pub(crate) fn set_delete_delay(&self, delay: Duration) {
        self.state.lock().delete_delay = delay;
    }

    pub(crate) fn fail_deletes_of(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing_deletes.insert(path.into());
    }

    pub(crate) fn fail_scan_of(&self, dir: impl Into<PathBuf>) {
        self.state.lock().failing_dirs.insert(dir.into());
    }

    fn build_level(&self, state: &State, dir: &Path, failures: &mut Vec<ScanFailure>) -> Vec<FileNode> {
        if state.failing_dirs.contains(dir) {
            failures.push(ScanFailure {
                path: dir.to_path_buf(),
                error: StoreError::PermissionDenied(dir.to_path_buf()),
            });
            return Vec::new();
        }

        let mut nodes = Vec::new();
        for (path, entry) in &state.entries {
            if path.parent() != Some(dir) {
                continue;
            }
            match entry {
                Entry::Dir => {
                    let children = self.build_level(state, path, failures);
                    nodes.push(FileNode::folder(path.clone(), children));
                }
                Entry::File(_) => {
                    if paths::has_extension(&paths::file_name(path), &self.extension) {
                        nodes.push(FileNode::file(path.clone()));
                    }
                }
            }
        }
        // Reverse so callers cannot rely on the store for ordering.
        nodes.reverse();
        nodes
    }

    fn create_unique(&self, parent: &Path, file: bool) -> StoreResult<PathBuf> {
        let mut state = self.state.lock();
        if !matches!(state.entries.get(parent), Some(Entry::Dir)) {
            return Err(StoreError::NotFound(parent.to_path_buf()));
        }
        for attempt in 0..MAX_NAME_PROBES {
            let name = if file {
                paths::candidate_name(paths::UNTITLED_NOTE, Some(&self.extension), attempt)
            } else {
                paths::candidate_name(paths::NEW_FOLDER, None, attempt)
            };
            let candidate = parent.join(name);
            if state.entries.contains_key(&candidate) {
                continue;
            }
            let entry = if file { Entry::File(String::new()) } else { Entry::Dir };
            state.entries.insert(candidate.clone(), entry);
            return Ok(candidate);
        }
        Err(StoreError::Conflict(parent.to_path_buf()))
    }
}

impl DocumentStore for MemoryStore {
    fn list_tree<'a>(&'a self, root: &'a Path) -> StoreFuture<'a, TreeScan> {
        async move {
            let mut state = self.state.lock();
            state.entries.entry(root.to_path_buf()).or_insert(Entry::Dir);
            let mut failures = Vec::new();
            let nodes = self.build_level(&state, root, &mut failures);
            Ok(TreeScan { nodes, failures })
        }
        .boxed()
    }

    fn read_file<'a>(&'a self, path: &'a Path) -> StoreFuture<'a, String> {
        async move {
            let delay = self.state.lock().read_delays.get(path).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.contents(path)
                .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
        }
        .boxed()
    }

    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> StoreFuture<'a, ()> {
        async move {
            let delay = self.state.lock().write_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock();
            if state.failing_writes.contains(path) {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source: io::Error::other("injected write failure"),
                });
            }
            state
                .entries
                .insert(path.to_path_buf(), Entry::File(content.to_string()));
            state.writes.push((path.to_path_buf(), content.to_string()));
            Ok(())
        }
        .boxed()
    }

    fn create_file<'a>(&'a self, parent: &'a Path) -> StoreFuture<'a, PathBuf> {
        async move { self.create_unique(parent, true) }.boxed()
    }

    fn create_folder<'a>(&'a self, parent: &'a Path) -> StoreFuture<'a, PathBuf> {
        async move { self.create_unique(parent, false) }.boxed()
    }

    fn delete_path<'a>(&'a self, path: &'a Path) -> StoreFuture<'a, ()> {
        async move {
            let delay = self.state.lock().delete_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock();
            if state.failing_deletes.contains(path) {
                return Err(StoreError::PermissionDenied(path.to_path_buf()));
            }
            if !state.entries.contains_key(path) {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            state.entries.retain(|p, _| !p.starts_with(path));
            Ok(())
        }
        .boxed()
    }

    fn move_path<'a>(&'a self, src: &'a Path, dest: &'a Path) -> StoreFuture<'a, ()> {
        async move {
            let mut state = self.state.lock();
            if !state.entries.contains_key(src) {
                return Err(StoreError::NotFound(src.to_path_buf()));
            }
            if dest != src && dest.starts_with(src) {
                return Err(StoreError::InvalidMove(src.to_path_buf()));
            }
            if state.entries.contains_key(dest) {
                return Err(StoreError::Conflict(dest.to_path_buf()));
            }
            let moved: Vec<(PathBuf, Entry)> = state
                .entries
                .iter()
                .filter_map(|(p, e)| paths::retarget(p, src, dest).map(|to| (to, e.clone())))
                .collect();
            state.entries.retain(|p, _| !p.starts_with(src));
            state.entries.extend(moved);
            Ok(())
        }
        .boxed()
    }
}
