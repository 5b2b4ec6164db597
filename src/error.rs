//! Error types for wav2train.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // External tools
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    // Alignment errors
    #[error("Alignment failed for {}: {message}", audio.display())]
    Align { audio: PathBuf, message: String },

    // Audio errors
    #[error("Failed to decode {}: {message}", path.display())]
    AudioDecode { path: PathBuf, message: String },

    #[error("Audio tool failed on {}: {message}", path.display())]
    AudioTool { path: PathBuf, message: String },

    // Manifest errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Malformed alignment output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl PrepError {
    /// Returns true for errors that must stop the run before any work starts.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            PrepError::ConfigFileNotFound { .. }
                | PrepError::ConfigInvalidValue { .. }
                | PrepError::Config(_)
        )
    }
}

/// Errors raised while parsing a manifest line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManifestError {
    #[error("expected 4 space-separated fields, found {found}")]
    MissingFields { found: usize },

    #[error("field '{field}' is empty")]
    EmptyField { field: &'static str },

    #[error("invalid duration '{value}'")]
    InvalidDuration { value: String },

    #[error("field '{field}' must not contain spaces")]
    SpaceInField { field: &'static str },

    #[error("text must not contain line breaks")]
    Newline,
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PrepError>;
