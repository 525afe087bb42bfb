// File tree node model
// The path doubles as the stable id; there is no sidecar metadata

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// One entry of the notes directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
    #[serde(default)]
    pub is_expanded: bool,
}

impl FileNode {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::build(path.into(), NodeKind::File, None)
    }

    pub fn folder(path: impl Into<PathBuf>, children: Vec<FileNode>) -> Self {
        Self::build(path.into(), NodeKind::Folder, Some(children))
    }

    fn build(path: PathBuf, kind: NodeKind, children: Option<Vec<FileNode>>) -> Self {
        Self {
            id: path.to_string_lossy().into_owned(),
            name: paths::file_name(&path),
            path,
            kind,
            children,
            is_expanded: false,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn children(&self) -> &[FileNode] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Depth-first lookup of `path` in this subtree.
    pub fn find(&self, path: &Path) -> Option<&FileNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children().iter().find_map(|child| child.find(path))
    }
}
