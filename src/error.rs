//! Error types for passview.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for store and workflow operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot read password store root {path}: {reason}")]
    RootUnreadable { path: PathBuf, reason: String },

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Failed to decrypt file:\n{diagnostic}")]
    DecryptFailed { diagnostic: String },

    #[error("Failed to encrypt file:\n{diagnostic}")]
    EncryptFailed { diagnostic: String },

    #[error("Recipient cannot be empty")]
    RecipientRequired,

    #[error("Another edit session is already active for {0}")]
    SessionActive(PathBuf),

    #[error("Failed to prepare temporary file: {0}")]
    TempFile(String),

    #[error("Git command failed:\n{diagnostic}")]
    GitFailed { diagnostic: String },

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Editor launch failed")]
    EditorFailed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
