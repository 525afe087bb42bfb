// Open tab model
// A tab is a handle to a document, not the document's content

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::FileNode;
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub path: PathBuf,
    pub name: String,
}

impl Tab {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = paths::file_name(&path);
        Self { path, name }
    }

    pub fn is_for(&self, path: &Path) -> bool {
        self.path == path
    }
}

impl From<&FileNode> for Tab {
    fn from(node: &FileNode) -> Self {
        Self {
            path: node.path.clone(),
            name: node.name.clone(),
        }
    }
}
