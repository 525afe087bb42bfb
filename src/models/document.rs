// Active document projection

use serde::Serialize;
use std::path::PathBuf;

/// The document currently shown in the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDocument {
    pub title: String,
    pub content: String,
    pub path: PathBuf,
    pub last_edit_time: i64,
}
