// Active document commands: read, edit, save

use std::path::PathBuf;
use tauri::{AppHandle, State};

use super::common::{notify_save_failure, to_message};
use crate::events::Versioned;
use crate::models::ActiveDocument;
use crate::save_queue::SaveStatus;
use crate::workspace::WorkspaceState;

#[tauri::command]
pub async fn get_active_document(
    workspace: State<'_, WorkspaceState>,
) -> Result<Versioned<Option<ActiveDocument>>, String> {
    Ok(workspace.active_document())
}

/// Editor change; schedules an autosave. False when ignored.
#[tauri::command]
pub async fn edit_document(workspace: State<'_, WorkspaceState>, content: String) -> Result<bool, String> {
    Ok(workspace.edit(&content))
}

#[tauri::command]
pub async fn blur_editor(app: AppHandle, workspace: State<'_, WorkspaceState>) -> Result<(), String> {
    let path = workspace.document_path();
    workspace.blur().await.map_err(|err| {
        if let Some(path) = &path {
            notify_save_failure(&app, path, &err);
        }
        to_message(err)
    })
}

#[tauri::command]
pub async fn save_document(
    app: AppHandle,
    workspace: State<'_, WorkspaceState>,
    content: String,
) -> Result<(), String> {
    let path = workspace.document_path();
    workspace.save(&content).await.map_err(|err| {
        if let Some(path) = &path {
            notify_save_failure(&app, path, &err);
        }
        to_message(err)
    })
}

#[tauri::command]
pub async fn get_save_status(
    workspace: State<'_, WorkspaceState>,
    path: PathBuf,
) -> Result<SaveStatus, String> {
    Ok(workspace.save_status(&path))
}
