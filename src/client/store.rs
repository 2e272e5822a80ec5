//! Action orchestration for the client.
//!
//! Each public method plays the role of one UI-triggered action: it
//! dispatches `loading`, calls the backend, then dispatches the outcome.
//! After any successful note mutation the whole list is fetched again
//! instead of patching local state.

use std::mem;

use log::{debug, info, warn};

use crate::{
    reduce, Action, ClientState, LoginInput, NoteDraft, NoteOp, NotePatch, NotesBackend,
    NotesError, Notification, PersistedSession, RegisterInput, SessionStore, UserState,
    MSG_SESSION_EXPIRED,
};

pub struct Store<B: NotesBackend, S: SessionStore> {
    backend: B,
    sessions: S,
    state: ClientState,
}

impl<B: NotesBackend, S: SessionStore> Store<B, S> {
    /// Creates the store, restoring a persisted session if there is one.
    pub fn new(backend: B, sessions: S) -> Self {
        let persisted = sessions.load().unwrap_or_else(|e| {
            warn!("Could not read persisted session: {}", e);
            None
        });

        let state = ClientState {
            user: UserState::from_session(persisted),
            ..ClientState::default()
        };

        Self {
            backend,
            sessions,
            state,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.user.auth
    }

    /// Applies an action, then persists or clears the session when the
    /// action changed it.
    pub fn dispatch(&mut self, action: Action) {
        let state = mem::take(&mut self.state);
        self.state = reduce(state, &action);

        let persisted = match &action {
            Action::LoginSuccess { user, token } => self.sessions.save(&PersistedSession {
                token: token.clone(),
                user: user.clone(),
            }),
            Action::Logout => self.sessions.clear(),
            _ => Ok(()),
        };
        if let Err(e) = persisted {
            warn!("Failed to persist session change: {}", e);
        }
    }

    /// Drains pending notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let pending = self.state.notifications.clone();
        self.dispatch(Action::ClearNotifications);
        pending
    }

    pub async fn register(&mut self, input: RegisterInput) -> bool {
        self.dispatch(Action::RegisterLoading);

        match self.backend.register(&input).await {
            Ok(message) => {
                self.notify_success(non_empty(message, "Signup successful"));
                self.dispatch(Action::RegisterSuccess);
                true
            }
            Err(e) => {
                self.notify_error(failure_message(e, "Signup failed. Please try again."));
                self.dispatch(Action::RegisterError);
                false
            }
        }
    }

    pub async fn login(&mut self, input: LoginInput) -> bool {
        self.dispatch(Action::LoginLoading);

        match self.backend.login(&input).await {
            Ok(reply) => {
                self.notify_success(format!("Welcome back, {}!", reply.user));
                self.dispatch(Action::LoginSuccess {
                    user: reply.user,
                    token: reply.token,
                });
                true
            }
            Err(e) => {
                let message = match e {
                    NotesError::Rejected { message } => non_empty(message, "Invalid credentials"),
                    other => {
                        warn!("Login request failed: {}", other);
                        "An error occurred during login. Please try again.".to_string()
                    }
                };
                self.notify_error(message);
                self.dispatch(Action::LoginError);
                false
            }
        }
    }

    /// Clears the local session. The server-side session is revoked on a
    /// best-effort basis.
    pub async fn logout(&mut self) {
        if let Some(token) = self.state.user.token.clone() {
            if let Err(e) = self.backend.logout(&token).await {
                debug!("Server-side logout failed: {}", e);
            }
        }
        self.notify_success("Logged out");
        self.dispatch(Action::Logout);
        info!("Logged out");
    }

    pub async fn forgot_password(&mut self, email: &str) -> bool {
        match self.backend.forgot_password(email).await {
            Ok(message) => {
                self.notify_success(message);
                true
            }
            Err(e) => {
                self.notify_error(failure_message(e, "Request failed. Please try again."));
                false
            }
        }
    }

    pub async fn get_notes(&mut self) -> bool {
        let Some(token) = self.require_token() else {
            return false;
        };
        self.dispatch(Action::NotesRequested(NoteOp::Get));

        match self.backend.list_notes(&token).await {
            Ok(notes) => {
                self.dispatch(Action::NotesFetched(notes));
                true
            }
            Err(e) => {
                self.fail(NoteOp::Get, e, "Failed to fetch notes. Please try again.");
                false
            }
        }
    }

    pub async fn create_note(&mut self, draft: NoteDraft) -> bool {
        if let Err(e) = draft.validate() {
            self.reject_locally(NoteOp::Create, e);
            return false;
        }
        let Some(token) = self.require_token() else {
            return false;
        };
        self.dispatch(Action::NotesRequested(NoteOp::Create));

        match self.backend.create_note(&token, &draft).await {
            Ok(note) => {
                debug!("Server created note {}", note.id);
                self.mutation_succeeded(NoteOp::Create, "Note created successfully")
                    .await;
                true
            }
            Err(e) => {
                self.fail(NoteOp::Create, e, "Failed to create note. Please try again.");
                false
            }
        }
    }

    pub async fn update_note(&mut self, id: &str, patch: NotePatch) -> bool {
        if let Err(e) = patch.validate() {
            self.reject_locally(NoteOp::Update, e);
            return false;
        }
        let Some(token) = self.require_token() else {
            return false;
        };
        self.dispatch(Action::NotesRequested(NoteOp::Update));

        match self.backend.update_note(&token, id, &patch).await {
            Ok(()) => {
                self.mutation_succeeded(NoteOp::Update, "Note updated successfully")
                    .await;
                true
            }
            Err(e) => {
                self.fail(NoteOp::Update, e, "Failed to update note. Please try again.");
                false
            }
        }
    }

    /// Deletes without asking; confirming is up to the caller.
    pub async fn delete_note(&mut self, id: &str) -> bool {
        let Some(token) = self.require_token() else {
            return false;
        };
        self.dispatch(Action::NotesRequested(NoteOp::Delete));

        match self.backend.delete_note(&token, id).await {
            Ok(()) => {
                self.mutation_succeeded(NoteOp::Delete, "Note deleted successfully")
                    .await;
                true
            }
            Err(e) => {
                self.fail(NoteOp::Delete, e, "Failed to delete note. Please try again.");
                false
            }
        }
    }

    async fn mutation_succeeded(&mut self, op: NoteOp, message: &str) {
        self.notify_success(message);
        self.dispatch(Action::NoteMutated(op));
        self.get_notes().await;
    }

    /// The held token, or a forced logout when there is none.
    fn require_token(&mut self) -> Option<String> {
        let token = self.state.user.token.clone();
        if token.is_none() {
            self.force_logout();
        }
        token
    }

    fn fail(&mut self, op: NoteOp, err: NotesError, default_message: &str) {
        match err {
            NotesError::Unauthorized => self.force_logout(),
            other => {
                self.notify_error(failure_message(other, default_message));
                self.dispatch(Action::NotesFailed(op));
            }
        }
    }

    fn reject_locally(&mut self, op: NoteOp, err: NotesError) {
        self.notify_error(err.to_string());
        self.dispatch(Action::NotesFailed(op));
    }

    fn force_logout(&mut self) {
        warn!("Session rejected, logging out");
        self.notify_error(MSG_SESSION_EXPIRED);
        self.dispatch(Action::Logout);
    }

    fn notify_success(&mut self, message: impl Into<String>) {
        self.dispatch(Action::Notify(Notification::success(message)));
    }

    fn notify_error(&mut self, message: impl Into<String>) {
        self.dispatch(Action::Notify(Notification::error(message)));
    }
}

/// The server's own message for rejections, `default` for anything else.
fn failure_message(err: NotesError, default: &str) -> String {
    match err {
        NotesError::Rejected { message } => non_empty(message, default),
        other => {
            warn!("Request failed: {}", other);
            default.to_string()
        }
    }
}

fn non_empty(message: String, default: &str) -> String {
    if message.trim().is_empty() {
        default.to_string()
    } else {
        message
    }
}
