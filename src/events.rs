// Versioned snapshots and change notifications for the view layer

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::save_queue::SaveStatus;
use crate::store::ScanFailure;

const EVENT_CAPACITY: usize = 256;

/// Immutable snapshot paired with a monotonically increasing version.
/// Consumers compare versions instead of diffing values.
#[derive(Debug, Serialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: Arc<T>,
}

impl<T> Clone for Versioned<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Versioned<T> {
    pub fn initial(value: T) -> Self {
        Self {
            version: 0,
            value: Arc::new(value),
        }
    }

    /// Successor snapshot holding `value`.
    pub fn next(&self, value: T) -> Self {
        Self {
            version: self.version + 1,
            value: Arc::new(value),
        }
    }

    pub fn is_newer_than(&self, version: u64) -> bool {
        self.version > version
    }
}

/// Unreadable subtree as shown to the view layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub message: String,
}

impl From<&ScanFailure> for ScanIssue {
    fn from(failure: &ScanFailure) -> Self {
        Self {
            path: failure.path.clone(),
            message: failure.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WorkspaceEvent {
    TreeChanged { version: u64 },
    /// The tree at `version` is missing the listed subtrees
    TreeIncomplete { version: u64, failures: Vec<ScanIssue> },
    TabsChanged { version: u64 },
    ActiveDocumentChanged { version: u64 },
    SaveStatus { path: PathBuf, status: SaveStatus },
}

/// Fan-out of workspace events. Publishing never blocks; slow receivers
/// observe `Lagged` and re-read snapshots.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<WorkspaceEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: WorkspaceEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }
}
