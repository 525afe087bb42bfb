// Workspace: the application state behind every intent
//
// Owns the tree model, tabs, active document and save queue, and publishes
// a WorkspaceEvent after each visible change. Locks are taken for short
// synchronous sections only and never held across an await.

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::document::{self, DocumentSlot};
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::events::{Notifier, Versioned, WorkspaceEvent};
use crate::models::{ActiveDocument, FileNode, NodeKind, Settings};
use crate::paths;
use crate::save_queue::{SaveQueue, SaveStatus};
use crate::storage;
use crate::store::{DocumentStore, LocalStore};
use crate::tabs::TabManager;
use crate::tree::{FileTreeModel, RefreshReport};
use crate::watcher;

pub type WorkspaceState = Arc<Workspace>;

// ===== COLLABORATORS =====

/// Asks the user whether `path` may be deleted
pub trait ConfirmDelete: Send + Sync {
    fn confirm<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;
}

/// Confirms every delete without asking
pub struct AutoConfirm;

impl ConfirmDelete for AutoConfirm {
    fn confirm<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, bool> {
        futures::future::ready(true).boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
    Failed,
}

/// The node last clicked in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

/// Marks a document switch in progress for as long as it lives
struct SwitchGuard<'a>(&'a AtomicUsize);

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ===== WORKSPACE =====

pub struct Workspace {
    settings: Settings,
    extension: String,
    store: Arc<dyn DocumentStore>,
    tree: FileTreeModel,
    tabs: RwLock<Versioned<TabManager>>,
    document: DocumentSlot,
    saves: SaveQueue,
    notifier: Notifier,
    confirm: Arc<dyn ConfirmDelete>,
    selection: RwLock<Option<Selection>>,
    switching: AtomicUsize,
    shutdown: CancellationToken,
}

impl Workspace {
    pub fn new(
        settings: Settings,
        root: impl Into<PathBuf>,
        store: Arc<dyn DocumentStore>,
        confirm: Arc<dyn ConfirmDelete>,
    ) -> WorkspaceState {
        let notifier = Notifier::new();
        let saves = SaveQueue::new(
            Arc::clone(&store),
            settings.autosave_interval(),
            notifier.clone(),
        );
        Arc::new(Self {
            extension: settings.extension().to_string(),
            settings,
            store,
            tree: FileTreeModel::new(root),
            tabs: RwLock::new(Versioned::initial(TabManager::new())),
            document: DocumentSlot::new(),
            saves,
            notifier,
            confirm,
            selection: RwLock::new(None),
            switching: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
        })
    }

    /// Workspace over the configured notes directory on disk. Scans the
    /// tree once and starts the external-change watcher when enabled.
    pub async fn open_local(
        settings: Settings,
        confirm: Arc<dyn ConfirmDelete>,
    ) -> Result<WorkspaceState, ConfigError> {
        let root = storage::notes_root(&settings)?;
        let store = Arc::new(LocalStore::new(settings.extension()));
        let watch = settings.watch_external_changes;
        let workspace = Self::new(settings, root, store, confirm);

        tracing::info!(root = %workspace.root().display(), "opening workspace");
        workspace.refresh_quietly().await;

        if watch {
            if let Err(err) = watcher::spawn(Arc::clone(&workspace)) {
                tracing::warn!(error = %err, "file watcher unavailable; external changes need a manual refresh");
            }
        }
        Ok(workspace)
    }

    // ===== SNAPSHOTS =====

    pub fn root(&self) -> &Path {
        self.tree.root()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn file_tree(&self) -> Versioned<Vec<FileNode>> {
        self.tree.snapshot()
    }

    pub fn tabs(&self) -> Versioned<TabManager> {
        self.tabs.read().clone()
    }

    pub fn active_tab_path(&self) -> Option<PathBuf> {
        self.tabs.read().value.active().map(Path::to_path_buf)
    }

    pub fn active_document(&self) -> Versioned<Option<ActiveDocument>> {
        self.document.current()
    }

    pub fn save_status(&self, path: &Path) -> SaveStatus {
        self.saves.status(path)
    }

    /// Path of the document currently loaded in the editor.
    pub fn document_path(&self) -> Option<PathBuf> {
        self.document.loaded_path()
    }

    pub fn find_node(&self, path: &Path) -> Option<FileNode> {
        self.tree.find(path)
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.notifier.subscribe()
    }

    pub fn is_switching(&self) -> bool {
        self.switching.load(Ordering::SeqCst) > 0
    }

    /// Token cancelled by `shutdown`; background tasks stop on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    // ===== TREE INTENTS =====

    pub async fn refresh_tree(&self) -> StoreResult<RefreshReport> {
        let report = self.tree.refresh(self.store.as_ref()).await?;
        if report.applied {
            self.notifier
                .publish(WorkspaceEvent::TreeChanged { version: report.version });
            if !report.failures.is_empty() {
                self.notifier.publish(WorkspaceEvent::TreeIncomplete {
                    version: report.version,
                    failures: report.issues(),
                });
            }
        }
        Ok(report)
    }

    pub(crate) async fn refresh_quietly(&self) {
        if let Err(err) = self.refresh_tree().await {
            tracing::error!(error = %err, "failed to refresh file tree");
        }
    }

    pub fn select(&self, node: Option<&FileNode>) {
        *self.selection.write() = node.map(|node| Selection {
            path: node.path.clone(),
            kind: node.kind,
        });
    }

    pub fn toggle_expanded(&self, path: &Path) {
        let version = self.tree.toggle_expanded(path);
        self.notifier.publish(WorkspaceEvent::TreeChanged { version });
    }

    pub fn collapse_all(&self) {
        if let Some(version) = self.tree.collapse_all() {
            self.notifier.publish(WorkspaceEvent::TreeChanged { version });
        }
    }

    fn check_inside_root(&self, path: &Path) -> StoreResult<()> {
        let climbs = path.components().any(|c| matches!(c, Component::ParentDir));
        if !climbs && paths::is_within(path, self.root()) {
            Ok(())
        } else {
            Err(StoreError::OutsideRoot(path.to_path_buf()))
        }
    }

    /// Explicit parent, else derived from the selection, else the root.
    fn creation_parent(&self, parent: Option<&Path>) -> PathBuf {
        if let Some(parent) = parent {
            return parent.to_path_buf();
        }
        match self.selection() {
            Some(Selection { path, kind: NodeKind::Folder }) => path,
            Some(Selection { path, kind: NodeKind::File }) => path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root().to_path_buf()),
            None => self.root().to_path_buf(),
        }
    }

    pub async fn create_file(&self, parent: Option<&Path>) -> Option<PathBuf> {
        self.create_entry(parent, NodeKind::File).await
    }

    pub async fn create_folder(&self, parent: Option<&Path>) -> Option<PathBuf> {
        self.create_entry(parent, NodeKind::Folder).await
    }

    async fn create_entry(&self, parent: Option<&Path>, kind: NodeKind) -> Option<PathBuf> {
        let parent = self.creation_parent(parent);
        if let Err(err) = self.check_inside_root(&parent) {
            tracing::warn!(error = %err, "create refused");
            return None;
        }

        let created = match kind {
            NodeKind::File => self.store.create_file(&parent).await,
            NodeKind::Folder => self.store.create_folder(&parent).await,
        };
        let path = match created {
            Ok(path) => path,
            Err(err) => {
                tracing::error!(parent = %parent.display(), error = %err, "create failed");
                return None;
            }
        };

        if parent != self.root() {
            self.tree.set_expanded(&parent, true);
        }
        self.refresh_quietly().await;
        Some(path)
    }

    /// Delete `path` after confirmation. A path that is already gone
    /// counts as deleted.
    pub async fn delete(&self, path: &Path) -> DeleteOutcome {
        if let Err(err) = self.check_inside_root(path) {
            tracing::warn!(error = %err, "delete refused");
            return DeleteOutcome::Failed;
        }
        if path == self.root() {
            tracing::warn!(path = %path.display(), "refusing to delete the notes root");
            return DeleteOutcome::Failed;
        }

        if self.settings.confirm_delete && !self.confirm.confirm(path).await {
            tracing::info!(path = %path.display(), "delete cancelled");
            return DeleteOutcome::Cancelled;
        }

        let _switch = self.switch_if_loaded_within(path);
        // Held rather than dropped: a failed delete writes them back.
        let mut held = Vec::new();
        for lane in self.saves.lanes_within(path) {
            let content = self.saves.hold(&lane).await;
            held.push((lane, content));
        }

        match self.store.delete_path(path).await {
            Ok(()) => tracing::info!(path = %path.display(), "deleted"),
            Err(err) if err.is_not_found() => {
                tracing::debug!(path = %path.display(), "already gone")
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "delete failed");
                for (lane, content) in held {
                    if let Some(content) = content {
                        self.saves.enqueue_save(&lane, content);
                    }
                    self.saves.flush_pending(&lane).await;
                }
                return DeleteOutcome::Failed;
            }
        }
        for (lane, _) in &held {
            self.saves.discard(lane).await;
        }

        self.tree.forget_expanded(path);
        *self.selection.write() = None;

        let previous = self.active_tab_path();
        if self.commit_tabs(|tabs| tabs.apply_delete(path)) && self.active_tab_path() != previous {
            self.load_active().await;
        }
        self.refresh_quietly().await;
        DeleteOutcome::Deleted
    }

    /// Move or rename `src` to `dest`. Refused, with nothing changed, when
    /// `dest` exists or lies inside `src`.
    pub async fn move_path(&self, src: &Path, dest: &Path) -> bool {
        let guard = self
            .check_inside_root(src)
            .and_then(|()| self.check_inside_root(dest));
        if let Err(err) = guard {
            tracing::warn!(error = %err, "move refused");
            return false;
        }
        if src == self.root() {
            tracing::warn!("refusing to move the notes root");
            return false;
        }

        let _switch = self.switch_if_loaded_within(src);
        let lanes = self.saves.lanes_within(src);
        for lane in &lanes {
            self.saves.flush_pending(lane).await;
        }

        if let Err(err) = self.store.move_path(src, dest).await {
            if err.is_conflict() {
                tracing::warn!(src = %src.display(), dest = %dest.display(), "move refused: destination exists");
            } else {
                tracing::error!(src = %src.display(), dest = %dest.display(), error = %err, "move failed");
            }
            return false;
        }
        tracing::info!(src = %src.display(), dest = %dest.display(), "moved");

        // Drained above; retire the lanes keyed by the old paths.
        for lane in &lanes {
            self.saves.discard(lane).await;
        }

        self.tree.retarget_expanded(src, dest);
        {
            let mut selection = self.selection.write();
            if let Some(selected) = selection.as_mut() {
                if let Some(target) = paths::retarget(&selected.path, src, dest) {
                    selected.path = target;
                }
            }
        }
        self.commit_tabs(|tabs| tabs.apply_rename(src, dest));
        if let Some(version) = self.document.retarget(src, dest, &self.extension) {
            self.notifier
                .publish(WorkspaceEvent::ActiveDocumentChanged { version });
        }
        self.refresh_quietly().await;
        true
    }

    // ===== TAB INTENTS =====

    pub async fn open(&self, node: &FileNode) -> bool {
        if !node.is_file() {
            return false;
        }
        let changed = self.change_tabs(|tabs| tabs.open(node)).await;
        self.follow_active_tab();
        changed
    }

    /// Open the file at `path` as listed in the current tree.
    pub async fn open_path(&self, path: &Path) -> bool {
        match self.tree.find(path) {
            Some(node) => self.open(&node).await,
            None => {
                tracing::debug!(path = %path.display(), "open ignored: not in tree");
                false
            }
        }
    }

    /// Close the tab for `path`. Its save lane is flushed and retired once
    /// no tab or loaded document refers to it.
    pub async fn close(&self, path: &Path) -> bool {
        let changed = self.change_tabs(|tabs| tabs.close(path)).await;
        let still_open = self.tabs.read().value.tabs().iter().any(|tab| tab.path == path);
        if changed && !still_open && self.document.loaded_path().as_deref() != Some(path) {
            self.saves.retire(path).await;
        }
        changed
    }

    pub async fn switch_to(&self, path: &Path) -> bool {
        let changed = self.change_tabs(|tabs| tabs.switch_to(path)).await;
        if self.active_tab_path().as_deref() == Some(path) {
            self.follow_active_tab();
        }
        changed
    }

    pub async fn switch_by_index(&self, index: usize) -> bool {
        let changed = self.change_tabs(|tabs| tabs.switch_by_index(index)).await;
        let target = self.tabs.read().value.tabs().get(index).map(|tab| tab.path.clone());
        if target.is_some() && target == self.active_tab_path() {
            self.follow_active_tab();
        }
        changed
    }

    fn begin_switch(&self) -> SwitchGuard<'_> {
        self.switching.fetch_add(1, Ordering::SeqCst);
        SwitchGuard(&self.switching)
    }

    /// Switch guard for a delete or move of `path`, raised only when the
    /// loaded document lives at or below it.
    fn switch_if_loaded_within(&self, path: &Path) -> Option<SwitchGuard<'_>> {
        let loaded = self.document.loaded_path()?;
        paths::is_within(&loaded, path).then(|| self.begin_switch())
    }

    /// Point the selection at the active tab, or clear it.
    fn follow_active_tab(&self) {
        *self.selection.write() = self.active_tab_path().map(|path| Selection {
            path,
            kind: NodeKind::File,
        });
    }

    /// Apply `change` to a copy of the tabs and swap it in as a new
    /// version. Returns whether anything changed.
    fn commit_tabs(&self, change: impl FnOnce(&mut TabManager) -> bool) -> bool {
        let version = {
            let mut tabs = self.tabs.write();
            let mut next = (*tabs.value).clone();
            if !change(&mut next) {
                return false;
            }
            *tabs = tabs.next(next);
            tabs.version
        };
        self.notifier.publish(WorkspaceEvent::TabsChanged { version });
        true
    }

    /// Tab change that may move the active path. The outgoing document's
    /// pending autosave is written to its own path before the switch.
    async fn change_tabs<F>(&self, change: F) -> bool
    where
        F: Fn(&mut TabManager) -> bool,
    {
        let previous = self.active_tab_path();
        let predicted = {
            let mut probe = (*self.tabs.read().value).clone();
            change(&mut probe);
            probe.active().map(Path::to_path_buf)
        };

        let _switch = self.begin_switch();
        if predicted != previous {
            if let Some(previous) = &previous {
                self.saves.flush_pending(previous).await;
            }
        }

        let changed = self.commit_tabs(&change);
        if self.active_tab_path() != previous {
            self.follow_active_tab();
            self.load_active().await;
        }
        changed
    }

    async fn load_active(&self) {
        let Some(path) = self.active_tab_path() else {
            if let Some(version) = self.document.clear() {
                self.notifier
                    .publish(WorkspaceEvent::ActiveDocumentChanged { version });
            }
            return;
        };

        let ticket = self.document.begin(Some(&path));
        self.saves.flush_pending(&path).await;
        let result = document::resolve(self.store.as_ref(), Some(&path), &self.extension).await;

        if self.active_tab_path().as_deref() != Some(path.as_path()) {
            tracing::debug!(path = %path.display(), "active tab changed during read");
            return;
        }
        let loaded = match result {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read document");
                None
            }
        };
        if let Some(version) = self.document.apply(&ticket, loaded) {
            self.notifier
                .publish(WorkspaceEvent::ActiveDocumentChanged { version });
        }
    }

    // ===== EDITOR INTENTS =====

    /// Editor change to the active document. Ignored while a switch is in
    /// progress, since the editor may still show the outgoing document.
    pub fn edit(&self, content: &str) -> bool {
        if self.is_switching() {
            tracing::debug!("edit ignored during document switch");
            return false;
        }
        let Some(path) = self.document.loaded_path() else {
            return false;
        };
        if self.active_tab_path().as_deref() != Some(path.as_path()) {
            return false;
        }
        self.edit_at(&path, content)
    }

    /// Editor change addressed to an explicit path.
    pub fn edit_at(&self, path: &Path, content: &str) -> bool {
        if let Some(version) = self.document.update_content(path, content) {
            self.notifier
                .publish(WorkspaceEvent::ActiveDocumentChanged { version });
        }
        self.saves.enqueue_save(path, content);
        true
    }

    /// Editor lost focus: save the loaded document right away.
    pub async fn blur(&self) -> StoreResult<()> {
        let current = self.document.current();
        let Some(document) = current.value.as_ref() else {
            return Ok(());
        };
        self.saves
            .flush_and_save(&document.path, document.content.clone())
            .await
    }

    /// Manual save of `content` to the loaded document.
    pub async fn save(&self, content: &str) -> StoreResult<()> {
        let Some(path) = self.document.loaded_path() else {
            return Ok(());
        };
        if let Some(version) = self.document.update_content(&path, content) {
            self.notifier
                .publish(WorkspaceEvent::ActiveDocumentChanged { version });
        }
        self.saves.flush_and_save(&path, content).await
    }

    /// Stop background tasks and write out everything still queued.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.saves.flush_all().await;
        tracing::info!("workspace shut down");
    }
}
