//! Note and user operations behind the HTTP surface.
//!
//! Every note operation first resolves the session token to its user and
//! only ever touches notes owned by that user. A note owned by someone else
//! is indistinguishable from a missing one.

use std::sync::{Arc, OnceLock};

use log::{debug, error, info, warn};

use crate::{
    expiry_policy_for_hours, hash_password, normalize_email, verify_password, Config,
    ForgotPasswordInput, LoginInput, Note, NoteDraft, NotePatch, NoteStorage, NotesError,
    RegisterInput, Result, Session, SessionRegistry, User,
};

pub struct NoteService {
    storage: Arc<NoteStorage>,
    sessions: Arc<SessionRegistry>,
}

impl NoteService {
    pub fn new(storage: Arc<NoteStorage>, sessions: Arc<SessionRegistry>) -> Self {
        Self { storage, sessions }
    }

    /// All notes of the token's user, oldest first.
    pub fn list(&self, token: &str) -> Result<Vec<Note>> {
        let session = self.sessions.resolve(token)?;
        let notes = self.storage.notes_for_user(&session.user_id)?;
        debug!("Listing {} notes for user {}", notes.len(), session.user_id);
        Ok(notes)
    }

    pub fn create(&self, token: &str, draft: NoteDraft) -> Result<Note> {
        let session = self.sessions.resolve(token)?;
        draft.validate()?;

        let note = Note::new(draft.title, draft.body, session.user_id);
        self.storage.insert_note(note.clone())?;
        info!("Created note {} for user {}", note.id, note.user);
        Ok(note)
    }

    /// Applies `patch` to an owned note. Concurrent updates are
    /// last-write-wins.
    pub fn update(&self, token: &str, note_id: &str, patch: NotePatch) -> Result<Note> {
        let session = self.sessions.resolve(token)?;
        patch.validate()?;

        let mut note = self.owned_note(&session, note_id)?;
        note.apply(patch);
        self.storage.save_note(note.clone())?;
        info!("Updated note {}", note.id);
        Ok(note)
    }

    pub fn delete(&self, token: &str, note_id: &str) -> Result<()> {
        let session = self.sessions.resolve(token)?;
        self.owned_note(&session, note_id)?;

        match self.storage.delete_note(note_id)? {
            Some(_) => {
                info!("Deleted note {}", note_id);
                Ok(())
            }
            // removed by a concurrent request in between
            None => Err(NotesError::NoteNotFound {
                id: note_id.to_string(),
            }),
        }
    }

    fn owned_note(&self, session: &Session, note_id: &str) -> Result<Note> {
        match self.storage.get_note(note_id)? {
            Some(note) if note.is_owned_by(&session.user_id) => Ok(note),
            Some(_) => {
                warn!(
                    "User {} tried to touch note {} owned by someone else",
                    session.user_id, note_id
                );
                Err(NotesError::NoteNotFound {
                    id: note_id.to_string(),
                })
            }
            None => Err(NotesError::NoteNotFound {
                id: note_id.to_string(),
            }),
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Display name
    pub user: String,
    pub token: String,
}

pub struct UserService {
    storage: Arc<NoteStorage>,
    sessions: Arc<SessionRegistry>,
    min_password_length: usize,
}

impl UserService {
    pub fn new(
        storage: Arc<NoteStorage>,
        sessions: Arc<SessionRegistry>,
        min_password_length: usize,
    ) -> Self {
        Self {
            storage,
            sessions,
            min_password_length,
        }
    }

    /// Creates an account. Does not log the user in.
    pub fn register(&self, input: RegisterInput) -> Result<User> {
        input.validate(self.min_password_length)?;

        let email = normalize_email(&input.email);
        let hash = hash_password(&input.password)?;
        let user = User::new(input.name.trim().to_string(), &email, hash);

        if !self.storage.insert_user(user.clone())? {
            warn!("Registration rejected, email already in use");
            return Err(NotesError::UserAlreadyExists { email });
        }

        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Unknown email and wrong password fail identically.
    pub fn login(&self, input: LoginInput) -> Result<LoginOutcome> {
        let user = match self.storage.find_user_by_email(&input.email)? {
            Some(user) => user,
            None => {
                // keep the timing close to the wrong-password path
                if let Some(hash) = dummy_hash() {
                    let _ = verify_password(&input.password, hash);
                }
                warn!("Login failed");
                return Err(NotesError::InvalidCredentials);
            }
        };

        let verified = verify_password(&input.password, &user.password_hash).unwrap_or_else(|e| {
            error!("Stored password hash of user {} is unusable: {}", user.id, e);
            false
        });
        if !verified {
            warn!("Login failed");
            return Err(NotesError::InvalidCredentials);
        }

        let token = self.sessions.issue(&user)?;
        info!("User {} logged in", user.id);
        Ok(LoginOutcome {
            user: user.name,
            token,
        })
    }

    /// Revokes the session behind `token`.
    pub fn logout(&self, token: &str) -> Result<()> {
        let session = self.sessions.resolve(token)?;
        self.sessions.revoke(token)?;
        info!("User {} logged out", session.user_id);
        Ok(())
    }

    /// Pretends to send a reset link. Nothing is delivered.
    pub fn forgot_password(&self, input: ForgotPasswordInput) -> Result<()> {
        let email = normalize_email(&input.email);
        if email.is_empty() {
            return Err(NotesError::validation("Email is required"));
        }

        match self.storage.find_user_by_email(&email)? {
            Some(user) => {
                info!("Password reset requested for user {}, no email sent", user.id);
                Ok(())
            }
            None => Err(NotesError::EmailNotFound { email }),
        }
    }
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("not-a-real-password").ok())
        .as_deref()
}

/// Everything a request handler needs, shared behind an `Arc`.
pub struct Services {
    pub notes: NoteService,
    pub users: UserService,
    pub sessions: Arc<SessionRegistry>,
}

impl Services {
    pub fn open(config: &Config) -> Result<Self> {
        let storage = Arc::new(NoteStorage::open(&config.data_dir)?);
        let sessions = Arc::new(SessionRegistry::new(expiry_policy_for_hours(
            config.session_ttl_hours,
        )));

        Ok(Self {
            notes: NoteService::new(Arc::clone(&storage), Arc::clone(&sessions)),
            users: UserService::new(storage, Arc::clone(&sessions), config.min_password_length),
            sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn services(dir: &TempDir) -> Services {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        Services::open(&config).unwrap()
    }

    fn signup_and_login(services: &Services, email: &str) -> String {
        services
            .users
            .register(RegisterInput {
                name: "Ann".into(),
                email: email.into(),
                password: "secret123".into(),
            })
            .unwrap();
        services
            .users
            .login(LoginInput {
                email: email.into(),
                password: "secret123".into(),
            })
            .unwrap()
            .token
    }

    #[test]
    fn create_then_list() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        let token = signup_and_login(&services, "ann@example.com");

        let note = services
            .notes
            .create(&token, NoteDraft::new("Groceries", "Milk, eggs"))
            .unwrap();
        let notes = services.notes.list(&token).unwrap();

        assert_eq!(notes, vec![note]);
    }

    #[test]
    fn blank_fields_are_rejected_server_side() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        let token = signup_and_login(&services, "ann@example.com");

        let result = services.notes.create(&token, NoteDraft::new(" ", "body"));
        assert!(matches!(result, Err(NotesError::Validation { .. })));
        assert!(services.notes.list(&token).unwrap().is_empty());
    }

    #[test]
    fn foreign_notes_look_missing() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        let ann = signup_and_login(&services, "ann@example.com");
        let bob = signup_and_login(&services, "bob@example.com");

        let note = services
            .notes
            .create(&ann, NoteDraft::new("Private", "mine"))
            .unwrap();

        assert!(services.notes.list(&bob).unwrap().is_empty());
        assert!(matches!(
            services.notes.delete(&bob, &note.id),
            Err(NotesError::NoteNotFound { .. })
        ));
        assert!(matches!(
            services.notes.update(
                &bob,
                &note.id,
                NotePatch {
                    title: Some("stolen".into()),
                    body: None
                }
            ),
            Err(NotesError::NoteNotFound { .. })
        ));
        assert_eq!(services.notes.list(&ann).unwrap()[0].title, "Private");
    }

    #[test]
    fn invalid_token_is_unauthorized() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);

        assert!(matches!(
            services.notes.list("bogus"),
            Err(NotesError::Unauthorized)
        ));
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        signup_and_login(&services, "ann@example.com");

        let wrong_password = services
            .users
            .login(LoginInput {
                email: "ann@example.com".into(),
                password: "nope".into(),
            })
            .unwrap_err();
        let unknown_email = services
            .users
            .login(LoginInput {
                email: "who@example.com".into(),
                password: "secret123".into(),
            })
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[test]
    fn corrupt_password_hash_reads_as_invalid_credentials() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        let user = User::new("Ann".into(), "ann@example.com", "not-a-phc-string".into());
        assert!(services.users.storage.insert_user(user).unwrap());

        let result = services.users.login(LoginInput {
            email: "ann@example.com".into(),
            password: "secret123".into(),
        });
        assert!(matches!(result, Err(NotesError::InvalidCredentials)));
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        signup_and_login(&services, "ann@example.com");

        let again = services.users.register(RegisterInput {
            name: "Ann again".into(),
            email: "ANN@example.com".into(),
            password: "secret123".into(),
        });
        assert!(matches!(again, Err(NotesError::UserAlreadyExists { .. })));
    }

    #[test]
    fn logout_revokes_the_token() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        let token = signup_and_login(&services, "ann@example.com");

        services.users.logout(&token).unwrap();
        assert!(matches!(
            services.notes.list(&token),
            Err(NotesError::Unauthorized)
        ));
    }

    #[test]
    fn forgot_password_is_simulated() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        signup_and_login(&services, "ann@example.com");

        assert!(services
            .users
            .forgot_password(ForgotPasswordInput {
                email: "ann@example.com".into()
            })
            .is_ok());
        assert!(matches!(
            services.users.forgot_password(ForgotPasswordInput {
                email: "x@example.com".into()
            }),
            Err(NotesError::EmailNotFound { .. })
        ));
        assert!(matches!(
            services.users.forgot_password(ForgotPasswordInput::default()),
            Err(NotesError::Validation { .. })
        ));
    }
}
