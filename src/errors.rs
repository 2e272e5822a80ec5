//! Error types for the notably application.
//!
//! This module defines custom error types that categorize the failures
//! that can occur in storage, the services, and the client data layer.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for the notably application.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Note was not found, or belongs to another user.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// A document with the same ID already exists in its collection.
    #[error("Document already exists: {id}")]
    DocumentAlreadyExists { id: String },

    /// Input rejected before it reached the store.
    #[error("{message}")]
    Validation { message: String },

    /// Missing, unknown or expired session token.
    #[error("Session expired. Please login again.")]
    Unauthorized,

    /// Unknown email or wrong password. Both read the same on purpose.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration with an email that is already taken.
    #[error("User already exists: {email}")]
    UserAlreadyExists { email: String },

    /// Forgot-password for an unknown email.
    #[error("Email not found: {email}")]
    EmailNotFound { email: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// Password hashing or hash parsing failed.
    #[error("Password hashing failed: {message}")]
    PasswordHash { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// The server answered with a failure envelope (status 0).
    #[error("{message}")]
    Rejected { message: String },

    /// Transport failure talking to the notes server.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

impl NotesError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        NotesError::Validation {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the caller rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NotesError::NoteNotFound { .. }
                | NotesError::Validation { .. }
                | NotesError::Unauthorized
                | NotesError::InvalidCredentials
                | NotesError::UserAlreadyExists { .. }
                | NotesError::EmailNotFound { .. }
        )
    }
}
