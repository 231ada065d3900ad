//! Configuration and history file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/debug-shell/`
//! - macOS: `~/Library/Application Support/debug-shell/`
//! - Windows: `%APPDATA%\debug-shell\`

use std::io;
use std::path::PathBuf;

/// Name used for the project directories
const PROJECT_NAME: &str = "debug-shell";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", PROJECT_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the readline history file
pub fn history_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", PROJECT_NAME)
        .map(|dirs| dirs.data_dir().join("history"))
}

/// Ensure the data directory for the history file exists
pub fn ensure_history_dir() -> io::Result<Option<PathBuf>> {
    if let Some(path) = history_path() {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(Some(path))
    } else {
        Ok(None)
    }
}
