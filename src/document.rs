// Active document resolver
//
// Reads are ticketed: a read that finishes after a newer one started, or
// after the active path moved on, is thrown away instead of applied.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use crate::error::StoreResult;
use crate::events::Versioned;
use crate::models::ActiveDocument;
use crate::paths;
use crate::store::DocumentStore;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Load the document for `path`, or `None` when nothing is active.
pub async fn resolve(
    store: &dyn DocumentStore,
    path: Option<&Path>,
    extension: &str,
) -> StoreResult<Option<ActiveDocument>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = store.read_file(path).await?;
    Ok(Some(ActiveDocument {
        title: paths::title_for(path, extension),
        content,
        path: path.to_path_buf(),
        last_edit_time: now_ms(),
    }))
}

/// Handle for one in-flight resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTicket {
    pub id: u64,
    pub path: Option<PathBuf>,
}

struct SlotState {
    current_ticket: u64,
    document: Versioned<Option<ActiveDocument>>,
}

/// Holder of the active document snapshot
pub struct DocumentSlot {
    state: RwLock<SlotState>,
}

impl Default for DocumentSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSlot {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SlotState {
                current_ticket: 0,
                document: Versioned::initial(None),
            }),
        }
    }

    pub fn current(&self) -> Versioned<Option<ActiveDocument>> {
        self.state.read().document.clone()
    }

    /// Start a resolution for `path`; every earlier ticket goes stale.
    pub fn begin(&self, path: Option<&Path>) -> ReadTicket {
        let mut state = self.state.write();
        state.current_ticket += 1;
        ReadTicket {
            id: state.current_ticket,
            path: path.map(Path::to_path_buf),
        }
    }

    pub fn is_current(&self, ticket: &ReadTicket) -> bool {
        self.state.read().current_ticket == ticket.id
    }

    /// Apply a finished resolution. Returns the new version, or `None` when
    /// the ticket was superseded.
    pub fn apply(&self, ticket: &ReadTicket, document: Option<ActiveDocument>) -> Option<u64> {
        let mut state = self.state.write();
        if state.current_ticket != ticket.id {
            tracing::debug!(ticket = ticket.id, current = state.current_ticket, "stale document read discarded");
            return None;
        }
        state.document = state.document.next(document);
        Some(state.document.version)
    }

    /// Reflect an edit to `path` in place. Ignored unless `path` is the
    /// loaded document.
    pub fn update_content(&self, path: &Path, content: &str) -> Option<u64> {
        let mut state = self.state.write();
        let mut document = (*state.document.value).clone()?;
        if document.path != path {
            return None;
        }
        document.content = content.to_string();
        document.last_edit_time = now_ms();
        state.document = state.document.next(Some(document));
        Some(state.document.version)
    }

    /// Follow a move of `from` to `to` without re-reading.
    pub fn retarget(&self, from: &Path, to: &Path, extension: &str) -> Option<u64> {
        let mut state = self.state.write();
        let mut document = (*state.document.value).clone()?;
        let target = paths::retarget(&document.path, from, to)?;
        document.title = paths::title_for(&target, extension);
        document.path = target;
        state.document = state.document.next(Some(document));
        Some(state.document.version)
    }

    /// Drop the document and invalidate in-flight reads.
    pub fn clear(&self) -> Option<u64> {
        let mut state = self.state.write();
        state.current_ticket += 1;
        if state.document.value.is_none() {
            return None;
        }
        state.document = state.document.next(None);
        Some(state.document.version)
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.state
            .read()
            .document
            .value
            .as_ref()
            .as_ref()
            .map(|doc| doc.path.clone())
    }
}
