//! User accounts and the request bodies of the user endpoints.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{NotesError, Result};

/// A registered account. Only the Argon2 hash of the password is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name returned on login
    pub name: String,
    /// Normalized email, unique across the collection
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: &str, password_hash: String) -> Self {
        User {
            id: Uuid::new_v4().to_string(),
            name,
            email: normalize_email(email),
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Emails compare case-insensitively and ignore surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterInput {
    pub fn validate(&self, min_password_length: usize) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NotesError::validation("Name is required"));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(NotesError::validation("Email is required"));
        }
        if !email.contains('@') {
            return Err(NotesError::validation("Email is not valid"));
        }
        if self.password.trim().is_empty() {
            return Err(NotesError::validation("Password is required"));
        }
        if self.password.chars().count() < min_password_length {
            return Err(NotesError::validation(format!(
                "Password must be at least {min_password_length} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgotPasswordInput {
    #[serde(default)]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_validation() {
        assert!(input("Ann", "ann@example.com", "secret1").validate(6).is_ok());
        assert!(input("", "ann@example.com", "secret1").validate(6).is_err());
        assert!(input("Ann", "   ", "secret1").validate(6).is_err());
        assert!(input("Ann", "ann.example.com", "secret1").validate(6).is_err());
        assert!(input("Ann", "ann@example.com", "abc").validate(6).is_err());
    }

    #[test]
    fn blank_password_is_rejected_whatever_the_minimum() {
        let spaces = input("Ann", "ann@example.com", "      ").validate(6);
        assert!(matches!(spaces, Err(NotesError::Validation { message }) if message == "Password is required"));

        assert!(input("Ann", "ann@example.com", "").validate(0).is_err());
        assert!(input("Ann", "ann@example.com", "x").validate(0).is_ok());
    }

    #[test]
    fn email_is_normalized() {
        let user = User::new("Ann".into(), "  Ann@Example.COM ", "hash".into());
        assert_eq!(user.email, "ann@example.com");
    }
}
