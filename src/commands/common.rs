// Common helpers for commands

use futures::FutureExt;
use futures::future::BoxFuture;
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::fmt::Display;
use std::path::Path;
use tauri::AppHandle;
use tauri_plugin_notification::NotificationExt;
use tokio::sync::oneshot;

use crate::paths;
use crate::workspace::ConfirmDelete;

/// Error string for the webview
pub fn to_message(err: impl Display) -> String {
    err.to_string()
}

/// OS notification for a manual save that did not reach the disk
pub fn notify_save_failure(app: &AppHandle, path: &Path, err: impl Display) {
    let shown = app
        .notification()
        .builder()
        .title("Save failed")
        .body(format!("{}: {err}", paths::file_name(path)))
        .show();
    if let Err(e) = shown {
        tracing::warn!(error = %e, "failed to show notification");
    }
}

/// Native yes/no dialog before deleting, shown on the main thread
pub struct DialogConfirm {
    app: AppHandle,
}

impl DialogConfirm {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl ConfirmDelete for DialogConfirm {
    fn confirm<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        let name = paths::file_name(path);
        let (tx, rx) = oneshot::channel();
        let posted = self.app.run_on_main_thread(move || {
            let answer = MessageDialog::new()
                .set_level(MessageLevel::Warning)
                .set_title("Delete")
                .set_description(format!("Delete \"{name}\"? This cannot be undone."))
                .set_buttons(MessageButtons::YesNo)
                .show();
            let _ = tx.send(matches!(answer, MessageDialogResult::Yes));
        });
        let posted = posted.map_err(to_message);

        async move {
            if let Err(err) = posted {
                tracing::warn!(error = %err, "could not show delete confirmation");
                return false;
            }
            rx.await.unwrap_or(false)
        }
        .boxed()
    }
}
