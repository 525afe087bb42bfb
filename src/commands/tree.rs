// File tree commands: listing, expansion, selection, create/delete/move

use serde::Serialize;
use std::path::PathBuf;
use tauri::State;

use super::common::to_message;
use crate::events::{ScanIssue, Versioned};
use crate::models::FileNode;
use crate::workspace::{DeleteOutcome, WorkspaceState};

#[tauri::command]
pub async fn get_file_tree(
    workspace: State<'_, WorkspaceState>,
) -> Result<Versioned<Vec<FileNode>>, String> {
    Ok(workspace.file_tree())
}

#[derive(Debug, Serialize)]
pub struct TreeRefresh {
    pub version: u64,
    pub applied: bool,
    /// Subtrees that could not be read and show up empty
    pub failures: Vec<ScanIssue>,
}

/// Rescan the notes directory.
#[tauri::command]
pub async fn refresh_tree(workspace: State<'_, WorkspaceState>) -> Result<TreeRefresh, String> {
    let report = workspace.refresh_tree().await.map_err(to_message)?;
    Ok(TreeRefresh {
        version: report.version,
        applied: report.applied,
        failures: report.issues(),
    })
}

#[tauri::command]
pub async fn toggle_expanded(
    workspace: State<'_, WorkspaceState>,
    path: PathBuf,
) -> Result<(), String> {
    workspace.toggle_expanded(&path);
    Ok(())
}

#[tauri::command]
pub async fn collapse_all(workspace: State<'_, WorkspaceState>) -> Result<(), String> {
    workspace.collapse_all();
    Ok(())
}

/// Select a node by path, or clear the selection with `null`.
#[tauri::command]
pub async fn select_node(
    workspace: State<'_, WorkspaceState>,
    path: Option<PathBuf>,
) -> Result<(), String> {
    let node = path.and_then(|path| workspace.find_node(&path));
    workspace.select(node.as_ref());
    Ok(())
}

#[tauri::command]
pub async fn create_note(
    workspace: State<'_, WorkspaceState>,
    parent: Option<PathBuf>,
) -> Result<PathBuf, String> {
    workspace
        .create_file(parent.as_deref())
        .await
        .ok_or_else(|| "Failed to create note".to_string())
}

#[tauri::command]
pub async fn create_folder(
    workspace: State<'_, WorkspaceState>,
    parent: Option<PathBuf>,
) -> Result<PathBuf, String> {
    workspace
        .create_folder(parent.as_deref())
        .await
        .ok_or_else(|| "Failed to create folder".to_string())
}

#[tauri::command]
pub async fn delete_path(
    workspace: State<'_, WorkspaceState>,
    path: PathBuf,
) -> Result<DeleteOutcome, String> {
    Ok(workspace.delete(&path).await)
}

#[tauri::command]
pub async fn move_path(
    workspace: State<'_, WorkspaceState>,
    src: PathBuf,
    dest: PathBuf,
) -> Result<bool, String> {
    Ok(workspace.move_path(&src, &dest).await)
}
