// External change watcher
// Refreshes the file tree when entries appear, disappear or get renamed
// outside the app. Content edits are ignored; open documents are not reloaded.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::workspace::WorkspaceState;

/// Quiet period that ends a burst of events
const SETTLE_WINDOW: Duration = Duration::from_millis(250);

/// Events that change the shape of the tree
fn is_structural(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

/// Swallow events until the channel stays quiet for the settle window.
/// Returns how many were swallowed.
async fn drain_burst<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> usize {
    let mut drained = 0;
    while let Ok(Some(_)) = tokio::time::timeout(SETTLE_WINDOW, rx.recv()).await {
        drained += 1;
    }
    drained
}

/// Watch the workspace root until the workspace shuts down.
pub fn spawn(workspace: WorkspaceState) -> notify::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        // Receiver gone means the watch loop already stopped.
        let _ = tx.send(res);
    })?;
    watcher.watch(workspace.root(), RecursiveMode::Recursive)?;

    let token = workspace.shutdown_token();
    tokio::spawn(async move {
        let _watcher = watcher;
        tracing::info!(root = %workspace.root().display(), "watching for external changes");
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                None => break,
                Some(Ok(event)) if is_structural(&event.kind) => {
                    let coalesced = drain_burst(&mut rx).await;
                    tracing::debug!(paths = ?event.paths, coalesced, "external change");
                    workspace.refresh_quietly().await;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => tracing::warn!(error = %err, "file watcher error"),
            }
        }
        tracing::debug!("file watcher stopped");
    });
    Ok(())
}
