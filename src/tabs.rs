// Tab manager: ordered open documents plus the active path
//
// Pure state, no I/O. The active path, when set, always names a present tab.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::{FileNode, Tab};
use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabManager {
    tabs: Vec<Tab>,
    active: Option<PathBuf>,
}

impl TabManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.position(path).is_some()
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.is_for(path))
    }

    /// Open a file node: append a tab if it is not open yet, then make it
    /// active. Folders are ignored. Returns true when anything changed.
    pub fn open(&mut self, node: &FileNode) -> bool {
        if !node.is_file() {
            return false;
        }
        let mut changed = false;
        if !self.contains(&node.path) {
            self.tabs.push(Tab::from(node));
            changed = true;
        }
        if self.active.as_deref() != Some(node.path.as_path()) {
            self.active = Some(node.path.clone());
            changed = true;
        }
        changed
    }

    /// Close the tab for `path`. When it was active, the rightmost
    /// remaining tab becomes active.
    pub fn close(&mut self, path: &Path) -> bool {
        let Some(index) = self.position(path) else {
            return false;
        };
        self.tabs.remove(index);
        if self.active.as_deref() == Some(path) {
            self.active = self.tabs.last().map(|tab| tab.path.clone());
        }
        true
    }

    pub fn switch_to(&mut self, path: &Path) -> bool {
        if !self.contains(path) || self.active.as_deref() == Some(path) {
            return false;
        }
        self.active = Some(path.to_path_buf());
        true
    }

    pub fn switch_by_index(&mut self, index: usize) -> bool {
        match self.tabs.get(index) {
            Some(tab) if self.active.as_deref() != Some(tab.path.as_path()) => {
                self.active = Some(tab.path.clone());
                true
            }
            _ => false,
        }
    }

    /// Retarget tabs after `old` moved to `new`, keeping each tab's slot and
    /// the active status. Tabs below a moved folder follow it.
    pub fn apply_rename(&mut self, old: &Path, new: &Path) -> bool {
        let mut changed = false;
        for tab in &mut self.tabs {
            if let Some(target) = paths::retarget(&tab.path, old, new) {
                *tab = Tab::new(target);
                changed = true;
            }
        }
        if let Some(active) = self.active.as_ref() {
            if let Some(target) = paths::retarget(active, old, new) {
                self.active = Some(target);
            }
        }
        changed
    }

    /// Close every tab at or below `path`.
    pub fn apply_delete(&mut self, path: &Path) -> bool {
        let doomed: Vec<PathBuf> = self
            .tabs
            .iter()
            .filter(|tab| paths::is_within(&tab.path, path))
            .map(|tab| tab.path.clone())
            .collect();
        for tab in &doomed {
            self.close(tab);
        }
        !doomed.is_empty()
    }
}

/// Map a digit key to a tab index: `1`..`9` select tabs 0..8.
pub fn index_for_digit(digit: char) -> Option<usize> {
    match digit.to_digit(10) {
        Some(d @ 1..=9) => Some(d as usize - 1),
        _ => None,
    }
}
