//! Error types for workspace, store, and snapshot operations.

use thiserror::Error;

/// Primary error type for the layout designer core.
#[derive(Error, Debug)]
pub enum CldError {
    // Validation errors
    #[error("Invalid file type '{filename}': please upload a ZIP archive")]
    InvalidArchiveType { filename: String },

    #[error("Unable to open uploaded archive: {0}")]
    InvalidArchive(String),

    #[error("Invalid file name '{name}': {reason}")]
    InvalidFilename { name: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("State store has no entries yet")]
    StoreEmpty,

    #[error("Cannot import state from {path}: {reason}")]
    ImportSource { path: String, reason: String },

    // Archive errors
    #[error("Failed to extract archive contents: {0}")]
    Extraction(String),

    // Layout errors
    #[error("Layout template not found: {name}")]
    LayoutNotFound { name: String },

    #[error("Failed to parse layout template '{name}': {reason}")]
    TemplateParse { name: String, reason: String },

    #[error("Failed to render layout template '{name}': {reason}")]
    TemplateRender { name: String, reason: String },

    // Startup errors
    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("Web server failed to start on {addr}: {reason}")]
    WebServerFailed { addr: String, reason: String },

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl CldError {
    /// Returns true for errors caused by bad caller input.
    ///
    /// These are reported synchronously and never retried.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArchiveType { .. }
                | Self::InvalidArchive(_)
                | Self::InvalidFilename { .. }
                | Self::MissingField(_)
                | Self::InvalidPayload(_)
                | Self::LayoutNotFound { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArchiveType { .. } | Self::InvalidArchive(_) => {
                Some("Use an archive produced by: cld export")
            }
            Self::ImportSource { .. } => Some("The archive's state.db must come from cld export"),
            Self::StoreEmpty => Some("Run: cld reset"),
            Self::Startup(_) => Some("Check permissions on the data directory (--data-dir)"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CldError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for CldError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<zip::result::ZipError> for CldError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Extraction(e.to_string())
    }
}

/// Convenience type alias for Results using CldError.
pub type Result<T> = std::result::Result<T, CldError>;
