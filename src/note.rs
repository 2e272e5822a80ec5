//! Core note data structures.
//!
//! The serialized field names (`_id`, `createdAt`, `updatedAt`) are the ones
//! the web client of the notes API has always consumed.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{NotesError, Result};

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier for the note
    #[serde(rename = "_id")]
    pub id: String,
    /// Note title
    pub title: String,
    /// Note body, may carry HTML markup from a rich-text editor
    pub body: String,
    /// Id of the owning user. Not checked against the user collection.
    pub user: String,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new note owned by `user`
    pub fn new(title: String, body: String, user: String) -> Self {
        let now = Utc::now();

        Note {
            id: Uuid::new_v4().to_string(),
            title,
            body,
            user,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a validated patch and refreshes `updated_at`.
    pub fn apply(&mut self, patch: NotePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        self.touch();
    }

    /// Moves `updated_at` forward. The new value is always strictly later
    /// than both the previous one and `created_at`, even when the clock
    /// has not advanced.
    pub fn touch(&mut self) {
        let floor = self.updated_at.max(self.created_at);
        let now = Utc::now();
        self.updated_at = if now > floor {
            now
        } else {
            floor + Duration::milliseconds(1)
        };
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user == user_id
    }
}

/// Fields accepted when creating a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Title and body must both be non-empty after trimming.
    pub fn validate(&self) -> Result<()> {
        require_text("Title", &self.title)?;
        require_text("Body", &self.body)
    }
}

/// Partial update of a note. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }

    /// Every present field must be non-empty after trimming, and at least
    /// one field must be present.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(NotesError::validation("Nothing to update"));
        }
        if let Some(title) = &self.title {
            require_text("Title", title)?;
        }
        if let Some(body) = &self.body {
            require_text("Body", body)?;
        }
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(NotesError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}
