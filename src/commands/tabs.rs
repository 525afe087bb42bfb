// Tab commands

use std::path::PathBuf;
use tauri::State;

use crate::events::Versioned;
use crate::tabs::{TabManager, index_for_digit};
use crate::workspace::WorkspaceState;

#[tauri::command]
pub async fn get_tabs(workspace: State<'_, WorkspaceState>) -> Result<Versioned<TabManager>, String> {
    Ok(workspace.tabs())
}

#[tauri::command]
pub async fn open_file(workspace: State<'_, WorkspaceState>, path: PathBuf) -> Result<bool, String> {
    Ok(workspace.open_path(&path).await)
}

#[tauri::command]
pub async fn close_tab(workspace: State<'_, WorkspaceState>, path: PathBuf) -> Result<bool, String> {
    Ok(workspace.close(&path).await)
}

#[tauri::command]
pub async fn switch_tab(workspace: State<'_, WorkspaceState>, path: PathBuf) -> Result<bool, String> {
    Ok(workspace.switch_to(&path).await)
}

#[tauri::command]
pub async fn switch_tab_by_index(
    workspace: State<'_, WorkspaceState>,
    index: usize,
) -> Result<bool, String> {
    Ok(workspace.switch_by_index(index).await)
}

/// Ctrl/Cmd + digit shortcut
#[tauri::command]
pub async fn switch_tab_by_digit(
    workspace: State<'_, WorkspaceState>,
    digit: char,
) -> Result<bool, String> {
    match index_for_digit(digit) {
        Some(index) => Ok(workspace.switch_by_index(index).await),
        None => Ok(false),
    }
}
