// File tree model: versioned snapshot of the notes directory
//
// Rebuilt from a full rescan after every mutation; never patched in place.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::StoreResult;
use crate::events::{ScanIssue, Versioned};
use crate::models::{FileNode, NodeKind};
use crate::paths;
use crate::store::{DocumentStore, ScanFailure};

/// Outcome of a refresh that was applied or superseded
#[derive(Debug)]
pub struct RefreshReport {
    /// Version now visible to readers
    pub version: u64,
    /// False when a newer scan had already been applied
    pub applied: bool,
    pub failures: Vec<ScanFailure>,
}

impl RefreshReport {
    pub fn issues(&self) -> Vec<ScanIssue> {
        self.failures.iter().map(ScanIssue::from).collect()
    }
}

pub struct FileTreeModel {
    root: PathBuf,
    snapshot: RwLock<Versioned<Vec<FileNode>>>,
    expanded: RwLock<HashSet<PathBuf>>,
    next_ticket: AtomicU64,
    applied_ticket: RwLock<u64>,
}

impl FileTreeModel {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshot: RwLock::new(Versioned::initial(Vec::new())),
            expanded: RwLock::new(HashSet::new()),
            next_ticket: AtomicU64::new(1),
            applied_ticket: RwLock::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot(&self) -> Versioned<Vec<FileNode>> {
        self.snapshot.read().clone()
    }

    /// Rescan the whole tree and swap in the result.
    pub async fn refresh(&self, store: &dyn DocumentStore) -> StoreResult<RefreshReport> {
        let ticket = self.next_ticket.fetch_add(1, AtomicOrdering::SeqCst);
        let scan = store.list_tree(&self.root).await?;

        let mut nodes = scan.nodes;
        sort_nodes(&mut nodes);

        let mut applied_ticket = self.applied_ticket.write();
        if ticket < *applied_ticket {
            tracing::debug!(ticket, "discarding superseded tree scan");
            return Ok(RefreshReport {
                version: self.snapshot.read().version,
                applied: false,
                failures: scan.failures,
            });
        }
        *applied_ticket = ticket;

        apply_expanded(&mut nodes, &self.expanded.read());
        let version = {
            let mut snapshot = self.snapshot.write();
            *snapshot = snapshot.next(nodes);
            snapshot.version
        };
        drop(applied_ticket);

        tracing::debug!(version, failures = scan.failures.len(), "file tree refreshed");
        Ok(RefreshReport {
            version,
            applied: true,
            failures: scan.failures,
        })
    }

    pub fn find(&self, path: &Path) -> Option<FileNode> {
        let snapshot = self.snapshot.read();
        snapshot.value.iter().find_map(|node| node.find(path)).cloned()
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.expanded.read().contains(path)
    }

    /// Returns the new snapshot version when the flag actually changed.
    pub fn set_expanded(&self, path: &Path, expanded: bool) -> Option<u64> {
        let changed = {
            let mut set = self.expanded.write();
            if expanded {
                set.insert(path.to_path_buf())
            } else {
                set.remove(path)
            }
        };
        changed.then(|| self.restamp())
    }

    pub fn toggle_expanded(&self, path: &Path) -> u64 {
        let expanded = !self.is_expanded(path);
        self.set_expanded(path, expanded)
            .unwrap_or_else(|| self.snapshot.read().version)
    }

    pub fn collapse_all(&self) -> Option<u64> {
        let had_any = {
            let mut set = self.expanded.write();
            let had_any = !set.is_empty();
            set.clear();
            had_any
        };
        had_any.then(|| self.restamp())
    }

    /// Carry expanded flags across a move of `from` to `to`.
    pub fn retarget_expanded(&self, from: &Path, to: &Path) {
        let mut set = self.expanded.write();
        let moved: Vec<(PathBuf, PathBuf)> = set
            .iter()
            .filter_map(|p| paths::retarget(p, from, to).map(|new| (p.clone(), new)))
            .collect();
        for (old, new) in moved {
            set.remove(&old);
            set.insert(new);
        }
    }

    pub fn forget_expanded(&self, path: &Path) {
        self.expanded
            .write()
            .retain(|p| !paths::is_within(p, path));
    }

    /// Re-apply expanded flags to the current nodes as a new version.
    fn restamp(&self) -> u64 {
        let expanded = self.expanded.read();
        let mut snapshot = self.snapshot.write();
        let mut nodes = (*snapshot.value).clone();
        apply_expanded(&mut nodes, &expanded);
        *snapshot = snapshot.next(nodes);
        snapshot.version
    }
}

/// Folders before files, then case-insensitive name, then exact name.
pub fn compare_nodes(a: &FileNode, b: &FileNode) -> Ordering {
    kind_rank(a.kind)
        .cmp(&kind_rank(b.kind))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

fn kind_rank(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Folder => 0,
        NodeKind::File => 1,
    }
}

/// Sort every level of the tree in place.
pub fn sort_nodes(nodes: &mut [FileNode]) {
    nodes.sort_by(compare_nodes);
    for node in nodes.iter_mut() {
        if let Some(children) = node.children.as_mut() {
            sort_nodes(children);
        }
    }
}

fn apply_expanded(nodes: &mut [FileNode], expanded: &HashSet<PathBuf>) {
    for node in nodes.iter_mut() {
        node.is_expanded = node.is_folder() && expanded.contains(&node.path);
        if let Some(children) = node.children.as_mut() {
            apply_expanded(children, expanded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn assert_ordered(nodes: &[FileNode]) {
        for pair in nodes.windows(2) {
            assert_eq!(
                compare_nodes(&pair[0], &pair[1]),
                Ordering::Less,
                "{} should sort before {}",
                pair[0].name,
                pair[1].name
            );
        }
        for node in nodes {
            assert_ordered(node.children());
        }
    }

    fn sample_store() -> MemoryStore {
        MemoryStore::new()
            .with_dir("/notes")
            .with_file("/notes/zebra.md", "")
            .with_file("/notes/Apple.md", "")
            .with_file("/notes/banana.md", "")
            .with_file("/notes/photo.jpg", "")
            .with_dir("/notes/Work")
            .with_dir("/notes/archive")
            .with_file("/notes/archive/B.md", "")
            .with_file("/notes/archive/a.md", "")
            .with_dir("/notes/archive/old")
    }

    #[test]
    fn folders_first_then_case_insensitive_names() {
        let mut nodes = vec![
            FileNode::file("/n/b.md"),
            FileNode::folder("/n/Zeta", Vec::new()),
            FileNode::file("/n/A.md"),
            FileNode::folder("/n/alpha", Vec::new()),
        ];
        sort_nodes(&mut nodes);
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Zeta", "A.md", "b.md"]);
    }

    #[test]
    fn names_differing_only_in_case_still_order_totally() {
        let upper = FileNode::file("/n/Note.md");
        let lower = FileNode::file("/n/note.md");
        assert_eq!(compare_nodes(&upper, &lower), Ordering::Less);
        assert_eq!(compare_nodes(&lower, &upper), Ordering::Greater);
    }

    #[tokio::test]
    async fn refresh_sorts_every_level_and_keeps_empty_folders() {
        let store = sample_store();
        let model = FileTreeModel::new("/notes");

        let report = model.refresh(&store).await.unwrap();
        assert!(report.applied);
        assert_eq!(report.version, 1);

        let snapshot = model.snapshot();
        let names: Vec<&str> = snapshot.value.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "Work", "Apple.md", "banana.md", "zebra.md"]);
        assert_ordered(&snapshot.value);

        let archive = model.find(Path::new("/notes/archive")).unwrap();
        let children: Vec<&str> = archive.children().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(children, vec!["old", "a.md", "B.md"]);
        assert!(model.find(Path::new("/notes/Work")).unwrap().children().is_empty());
    }

    #[tokio::test]
    async fn unreadable_subtree_degrades_to_empty() {
        let store = sample_store();
        store.fail_scan_of("/notes/archive");
        let model = FileTreeModel::new("/notes");

        let report = model.refresh(&store).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("/notes/archive"));

        let archive = model.find(Path::new("/notes/archive")).unwrap();
        assert!(archive.is_folder());
        assert!(archive.children().is_empty());
        assert!(model.find(Path::new("/notes/zebra.md")).is_some());
    }

    #[tokio::test]
    async fn old_snapshot_survives_refresh() {
        let store = sample_store();
        let model = FileTreeModel::new("/notes");
        model.refresh(&store).await.unwrap();
        let before = model.snapshot();

        store.delete_path(Path::new("/notes/zebra.md")).await.unwrap();
        model.refresh(&store).await.unwrap();
        let after = model.snapshot();

        assert!(after.is_newer_than(before.version));
        assert!(before.value.iter().any(|n| n.name == "zebra.md"));
        assert!(!after.value.iter().any(|n| n.name == "zebra.md"));
    }

    #[tokio::test]
    async fn expanded_flags_follow_the_set() {
        let store = sample_store();
        let model = FileTreeModel::new("/notes");
        model.refresh(&store).await.unwrap();

        let archive = Path::new("/notes/archive");
        let version = model.toggle_expanded(archive);
        assert_eq!(version, 2);
        assert!(model.find(archive).unwrap().is_expanded);
        assert!(!model.find(Path::new("/notes/Work")).unwrap().is_expanded);

        // Survives a rescan.
        model.refresh(&store).await.unwrap();
        assert!(model.find(archive).unwrap().is_expanded);

        // Setting the same value again is not a change.
        assert_eq!(model.set_expanded(archive, true), None);

        model.retarget_expanded(archive, Path::new("/notes/attic"));
        assert!(model.is_expanded(Path::new("/notes/attic")));
        assert!(!model.is_expanded(archive));

        assert!(model.collapse_all().is_some());
        assert!(model.collapse_all().is_none());
    }
}
