// Commands module - exports all command handlers
// Submodules must be public for Tauri's generate_handler! macro

pub mod common;
pub mod document;
pub mod tabs;
pub mod tree;

use tauri::{AppHandle, Emitter};
use tokio::sync::broadcast::error::RecvError;

use crate::workspace::WorkspaceState;

/// Event name the webview listens on
pub const WORKSPACE_EVENT: &str = "workspace-event";

/// Relay workspace events to the webview until the workspace goes away.
pub fn forward_events(app: AppHandle, workspace: &WorkspaceState) {
    let mut events = workspace.subscribe();
    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(err) = app.emit(WORKSPACE_EVENT, &event) {
                        tracing::warn!(error = %err, "failed to emit workspace event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "webview fell behind workspace events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
