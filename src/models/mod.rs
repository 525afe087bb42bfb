// Models for the notes workspace
// Serialized fields use camelCase to match the webview side

pub mod config;
pub mod document;
pub mod file_node;
pub mod tab;

pub use config::Settings;
pub use document::ActiveDocument;
pub use file_node::{FileNode, NodeKind};
pub use tab::Tab;
