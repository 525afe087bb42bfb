// Writr: file-system backed markdown notes
//
// The save/sync core is plain async Rust. The Tauri shell around it is
// compiled only with the `desktop` feature.

#[cfg(feature = "desktop")]
mod commands;
pub mod document;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod paths;
pub mod save_queue;
pub mod storage;
pub mod store;
pub mod tabs;
pub mod tree;
mod watcher;
pub mod workspace;

pub use error::{ConfigError, StoreError, StoreResult};
pub use events::{Notifier, ScanIssue, Versioned, WorkspaceEvent};
pub use models::{ActiveDocument, FileNode, NodeKind, Settings, Tab};
pub use save_queue::{SaveQueue, SaveStatus, SaveTrigger};
pub use store::{DocumentStore, LocalStore};
pub use tabs::TabManager;
pub use tree::FileTreeModel;
pub use workspace::{AutoConfirm, ConfirmDelete, DeleteOutcome, Workspace, WorkspaceState};

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use tauri::{Manager, RunEvent};

    let (settings, config_error) = match storage::load_global_settings() {
        Ok(settings) => (settings, None),
        Err(err) => (Settings::default(), Some(err)),
    };
    let _logging = logging::init(&settings);
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "failed to load settings, using defaults");
    }

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .setup(move |app| {
            let confirm: Arc<dyn ConfirmDelete> = if settings.confirm_delete {
                Arc::new(commands::common::DialogConfirm::new(app.handle().clone()))
            } else {
                Arc::new(AutoConfirm)
            };
            let workspace =
                tauri::async_runtime::block_on(Workspace::open_local(settings.clone(), confirm))?;

            commands::forward_events(app.handle().clone(), &workspace);
            app.manage(workspace);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Tree
            commands::tree::get_file_tree,
            commands::tree::refresh_tree,
            commands::tree::toggle_expanded,
            commands::tree::collapse_all,
            commands::tree::select_node,
            commands::tree::create_note,
            commands::tree::create_folder,
            commands::tree::delete_path,
            commands::tree::move_path,
            // Tabs
            commands::tabs::get_tabs,
            commands::tabs::open_file,
            commands::tabs::close_tab,
            commands::tabs::switch_tab,
            commands::tabs::switch_tab_by_index,
            commands::tabs::switch_tab_by_digit,
            // Document
            commands::document::get_active_document,
            commands::document::edit_document,
            commands::document::blur_editor,
            commands::document::save_document,
            commands::document::get_save_status,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|handle, event| {
        if let RunEvent::Exit = event {
            if let Some(workspace) = handle.try_state::<WorkspaceState>() {
                tauri::async_runtime::block_on(workspace.shutdown());
            }
        }
    });
}
