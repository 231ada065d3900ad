//! Error types for the debugger shell
//!
//! Only genuinely unexpected failures travel through this type. User input
//! errors and evaluation errors are reported on the session's output stream
//! with a `***` prefix and never abort the interaction loop.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the debugger shell
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Read Loop Errors ===
    #[error("Line editor error: {0}")]
    Readline(String),

    // === Editor Launch Errors ===
    #[error("Could not detect editor. Configure it or set $EDITOR")]
    EditorNotFound,

    #[error("Editor command failed: {0}")]
    Editor(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file read error
    pub fn file_read(path: &str, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.to_string(),
            error: error.to_string(),
        }
    }
}

impl From<rustyline::error::ReadlineError> for Error {
    fn from(e: rustyline::error::ReadlineError) -> Self {
        match e {
            rustyline::error::ReadlineError::Io(io) => Self::Io(io),
            other => Self::Readline(other.to_string()),
        }
    }
}
