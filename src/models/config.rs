// Configuration model for Writr
// Stored as YAML frontmatter in ~/.writr/config.md

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NOTE_EXTENSION: &str = "md";
pub const DEFAULT_AUTOSAVE_MS: u64 = 3000;
pub const DEFAULT_LOG_FILTER: &str = "writr=info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Root of the notes tree; `None` means `~/Writr`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_dir: Option<PathBuf>,
    pub autosave_interval_ms: u64,
    /// Extension (without the dot) that marks a file as a note
    pub note_extension: String,
    pub confirm_delete: bool,
    pub watch_external_changes: bool,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notes_dir: None,
            autosave_interval_ms: DEFAULT_AUTOSAVE_MS,
            note_extension: DEFAULT_NOTE_EXTENSION.to_string(),
            confirm_delete: true,
            watch_external_changes: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    /// Note extension without a leading dot, falling back to `md` when blank.
    pub fn extension(&self) -> &str {
        let ext = self.note_extension.trim().trim_start_matches('.');
        if ext.is_empty() {
            DEFAULT_NOTE_EXTENSION
        } else {
            ext
        }
    }
}
