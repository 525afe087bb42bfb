// Config storage for Writr
// Settings live as YAML frontmatter in ~/.writr/config.md

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::Settings;

const CONFIG_DIR_NAME: &str = ".writr";
const NOTES_DIR_NAME: &str = "Writr";
const CONFIG_BODY: &str = "# Writr settings\n\nEdit the frontmatter above; unknown keys are ignored.\n";

// ============================================
// PATH HELPERS
// ============================================

fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::NoHomeDir)
}

/// Global config directory (~/.writr/)
pub fn global_config_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(CONFIG_DIR_NAME))
}

/// Global config file path
pub fn global_config_path() -> Result<PathBuf, ConfigError> {
    Ok(global_config_dir()?.join("config.md"))
}

/// Log directory (~/.writr/logs/)
pub fn log_dir() -> Result<PathBuf, ConfigError> {
    Ok(global_config_dir()?.join("logs"))
}

/// Default notes root (~/Writr)
pub fn default_notes_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(NOTES_DIR_NAME))
}

/// Notes root from settings, falling back to the default location
pub fn notes_root(settings: &Settings) -> Result<PathBuf, ConfigError> {
    match &settings.notes_dir {
        Some(dir) => Ok(dir.clone()),
        None => default_notes_dir(),
    }
}

// ============================================
// FRONTMATTER PARSING
// ============================================

/// Parse YAML frontmatter from markdown content
pub fn parse_frontmatter<T: serde::de::DeserializeOwned>(content: &str) -> Option<(T, String)> {
    let content = content.trim();
    let rest = content.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let yaml = rest[..end].trim();
    let body = rest[end + 4..].trim().to_string();

    let frontmatter: T = serde_yaml::from_str(yaml).ok()?;
    Some((frontmatter, body))
}

/// Serialize frontmatter + body to markdown
pub fn to_markdown<T: serde::Serialize>(frontmatter: &T, body: &str) -> Result<String, ConfigError> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{yaml}---\n\n{body}"))
}

// ============================================
// SETTINGS
// ============================================

/// Load settings from `path`. A missing file yields defaults, and so does
/// unparsable frontmatter (with a warning).
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file does not exist, using defaults");
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match parse_frontmatter::<Settings>(&content) {
        Some((settings, _)) => Ok(settings),
        None => {
            tracing::warn!(path = %path.display(), "failed to parse config frontmatter, using defaults");
            Ok(Settings::default())
        }
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = to_markdown(settings, CONFIG_BODY)?;
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the global settings, writing a default config on first run.
pub fn load_global_settings() -> Result<Settings, ConfigError> {
    let path = global_config_path()?;
    let existed = path.exists();
    let settings = load_settings(&path)?;
    if !existed {
        if let Err(err) = save_settings(&path, &settings) {
            tracing::warn!(error = %err, "could not write default config");
        }
    }
    Ok(settings)
}
