//! The `{status, message[, data]}` wire convention.
//!
//! Handlers and the client work with `Result<T, NotesError>`; the numeric
//! status only exists while a reply is on the wire.

use serde::{Deserialize, Serialize};

use crate::{NotesError, Result};

pub const MSG_SESSION_EXPIRED: &str = "Session expired. Please login again.";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const MSG_INTERNAL: &str = "Something went wrong";

/// Numeric outcome carried by every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    Failure = 0,
    Success = 1,
    /// The session token is missing, unknown or expired
    InvalidSession = 2,
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Failure),
            1 => Ok(Status::Success),
            2 => Ok(Status::InvalidSession),
            other => Err(format!("unknown status code {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Display name, login replies only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Session token, login replies only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data: None,
            user: None,
            token: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::success(message)
        }
    }

    pub fn login(user: String, token: String) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
            ..Self::success("Login successful")
        }
    }

    pub fn failure(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            user: None,
            token: None,
        }
    }

    /// Collapses an error into a reply. Only caller-caused errors keep
    /// their own message; everything else reads as a generic failure.
    pub fn from_error(err: &NotesError) -> Self {
        match err {
            NotesError::Unauthorized => Self::failure(Status::InvalidSession, MSG_SESSION_EXPIRED),
            NotesError::InvalidCredentials => Self::failure(Status::Failure, MSG_INVALID_CREDENTIALS),
            NotesError::NoteNotFound { .. } => Self::failure(Status::Failure, "Note not found"),
            NotesError::UserAlreadyExists { .. } => {
                Self::failure(Status::Failure, "User already exists")
            }
            NotesError::EmailNotFound { .. } => Self::failure(Status::Failure, "Email not found"),
            NotesError::Validation { message } | NotesError::Rejected { message } => {
                Self::failure(Status::Failure, message.clone())
            }
            _ => Self::failure(Status::Failure, MSG_INTERNAL),
        }
    }

    /// Translates a received reply back into a typed result.
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            Status::Success => Ok(self),
            Status::InvalidSession => Err(NotesError::Unauthorized),
            Status::Failure => Err(NotesError::Rejected {
                message: self.message,
            }),
        }
    }
}
