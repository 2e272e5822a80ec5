//! Client application state and its pure transition functions.
//!
//! One reducer per resource; [`reduce`] combines them. Reducers never
//! perform I/O; persisting the session is the [`Store`](crate::Store)'s job.

use crate::{Note, PersistedSession};

/// Lifecycle of the most recent async operation on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Which note operation an action refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOp {
    Get,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient, dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    LoginLoading,
    LoginSuccess { user: String, token: String },
    LoginError,
    RegisterLoading,
    RegisterSuccess,
    RegisterError,
    /// Explicit or forced logout
    Logout,
    NotesRequested(NoteOp),
    /// Full list received, replaces whatever was held
    NotesFetched(Vec<Note>),
    /// Create/update/delete accepted by the server
    NoteMutated(NoteOp),
    NotesFailed(NoteOp),
    Notify(Notification),
    ClearNotifications,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserState {
    pub token: Option<String>,
    /// Display name
    pub user: Option<String>,
    pub auth: bool,
    pub loading: bool,
    pub error: bool,
}

impl UserState {
    /// State after a reload: authenticated only when both the token and
    /// the name were persisted.
    pub fn from_session(session: Option<PersistedSession>) -> Self {
        match session {
            Some(session) if !session.token.is_empty() && !session.user.is_empty() => Self {
                token: Some(session.token),
                user: Some(session.user),
                auth: true,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotesState {
    pub notes: Vec<Note>,
    pub status: OpStatus,
    /// Shared by every note operation
    pub loading: bool,
    pub error: bool,
    /// Operation the status refers to
    pub last_op: Option<NoteOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientState {
    pub user: UserState,
    pub notes: NotesState,
    pub notifications: Vec<Notification>,
}

pub fn reduce_user(state: UserState, action: &Action) -> UserState {
    match action {
        Action::LoginLoading | Action::RegisterLoading => UserState {
            loading: true,
            ..state
        },
        Action::LoginSuccess { user, token } => UserState {
            token: Some(token.clone()),
            user: Some(user.clone()),
            auth: true,
            loading: false,
            error: false,
        },
        Action::LoginError | Action::RegisterError => UserState {
            loading: false,
            error: true,
            ..state
        },
        Action::RegisterSuccess => UserState {
            loading: false,
            error: false,
            ..state
        },
        Action::Logout => UserState::default(),
        _ => state,
    }
}

pub fn reduce_notes(state: NotesState, action: &Action) -> NotesState {
    match action {
        Action::NotesRequested(op) => NotesState {
            status: OpStatus::Loading,
            loading: true,
            last_op: Some(*op),
            ..state
        },
        Action::NotesFetched(notes) => NotesState {
            notes: notes.clone(),
            status: OpStatus::Success,
            loading: false,
            error: false,
            last_op: Some(NoteOp::Get),
        },
        Action::NoteMutated(op) => NotesState {
            status: OpStatus::Success,
            loading: false,
            error: false,
            last_op: Some(*op),
            ..state
        },
        Action::NotesFailed(op) => NotesState {
            status: OpStatus::Error,
            loading: false,
            error: true,
            last_op: Some(*op),
            ..state
        },
        // notes of the previous user must not outlive the session
        Action::Logout => NotesState::default(),
        _ => state,
    }
}

pub fn reduce_notifications(mut state: Vec<Notification>, action: &Action) -> Vec<Notification> {
    match action {
        Action::Notify(notification) => {
            state.push(notification.clone());
            state
        }
        Action::ClearNotifications => Vec::new(),
        _ => state,
    }
}

/// Root reducer.
pub fn reduce(state: ClientState, action: &Action) -> ClientState {
    ClientState {
        user: reduce_user(state.user, action),
        notes: reduce_notes(state.notes, action),
        notifications: reduce_notifications(state.notifications, action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_in() -> ClientState {
        reduce(
            ClientState::default(),
            &Action::LoginSuccess {
                user: "Ann".into(),
                token: "tok".into(),
            },
        )
    }

    #[test]
    fn restores_only_complete_sessions() {
        let full = UserState::from_session(Some(PersistedSession {
            token: "tok".into(),
            user: "Ann".into(),
        }));
        assert!(full.auth);

        let partial = UserState::from_session(Some(PersistedSession {
            token: "tok".into(),
            user: String::new(),
        }));
        assert!(!partial.auth);
        assert_eq!(UserState::from_session(None), UserState::default());
    }

    #[test]
    fn login_flow() {
        let loading = reduce(ClientState::default(), &Action::LoginLoading);
        assert!(loading.user.loading);

        let failed = reduce(loading.clone(), &Action::LoginError);
        assert!(failed.user.error && !failed.user.loading && !failed.user.auth);

        let state = logged_in();
        assert!(state.user.auth);
        assert_eq!(state.user.token.as_deref(), Some("tok"));
    }

    #[test]
    fn note_request_cycle() {
        let note = Note::new("t".into(), "b".into(), "u".into());
        let state = reduce(logged_in(), &Action::NotesRequested(NoteOp::Get));
        assert_eq!(state.notes.status, OpStatus::Loading);
        assert!(state.notes.loading);

        let state = reduce(state, &Action::NotesFetched(vec![note.clone()]));
        assert_eq!(state.notes.status, OpStatus::Success);
        assert_eq!(state.notes.notes, vec![note]);

        let state = reduce(state, &Action::NotesFailed(NoteOp::Delete));
        assert_eq!(state.notes.status, OpStatus::Error);
        assert_eq!(state.notes.last_op, Some(NoteOp::Delete));
        assert_eq!(state.notes.notes.len(), 1);
    }

    #[test]
    fn mutation_success_keeps_list_until_refetch() {
        let note = Note::new("t".into(), "b".into(), "u".into());
        let state = reduce(logged_in(), &Action::NotesFetched(vec![note.clone()]));
        let state = reduce(state, &Action::NoteMutated(NoteOp::Create));

        assert_eq!(state.notes.notes, vec![note]);
        assert_eq!(state.notes.last_op, Some(NoteOp::Create));
    }

    #[test]
    fn logout_clears_everything_but_notifications() {
        let note = Note::new("t".into(), "b".into(), "u".into());
        let state = reduce(logged_in(), &Action::NotesFetched(vec![note]));
        let state = reduce(state, &Action::Notify(Notification::error("bye")));
        let state = reduce(state, &Action::Logout);

        assert_eq!(state.user, UserState::default());
        assert_eq!(state.notes, NotesState::default());
        assert_eq!(state.notifications.len(), 1);

        let state = reduce(state, &Action::ClearNotifications);
        assert!(state.notifications.is_empty());
    }
}
