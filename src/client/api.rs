//! Authenticated calls to the notes API.
//!
//! Replies are decoded as envelopes whatever the HTTP status, then turned
//! into typed results: status 2 becomes [`NotesError::Unauthorized`],
//! status 0 becomes [`NotesError::Rejected`].

use std::future::Future;

use log::{debug, trace};
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::{
    Envelope, ForgotPasswordInput, LoginInput, Note, NoteDraft, NotePatch, NotesError,
    RegisterInput, Result,
};

/// Successful login reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    /// Display name
    pub user: String,
    pub token: String,
}

/// The remote side of the client data layer.
///
/// Every method returns the server's message on success where the caller
/// may want to show it.
pub trait NotesBackend: Send + Sync {
    fn register(&self, input: &RegisterInput) -> impl Future<Output = Result<String>> + Send;
    fn login(&self, input: &LoginInput) -> impl Future<Output = Result<LoginReply>> + Send;
    fn logout(&self, token: &str) -> impl Future<Output = Result<()>> + Send;
    fn forgot_password(&self, email: &str) -> impl Future<Output = Result<String>> + Send;
    fn list_notes(&self, token: &str) -> impl Future<Output = Result<Vec<Note>>> + Send;
    fn create_note(
        &self,
        token: &str,
        draft: &NoteDraft,
    ) -> impl Future<Output = Result<Note>> + Send;
    fn update_note(
        &self,
        token: &str,
        id: &str,
        patch: &NotePatch,
    ) -> impl Future<Output = Result<()>> + Send;
    fn delete_note(&self, token: &str, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// [`NotesBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `<base>/note/<id>` with the id escaped as a single path segment.
    fn note_url(&self, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| NotesError::ConfigError {
            message: format!("invalid server URL {}: {e}", self.base_url),
        })?;
        url.path_segments_mut()
            .map_err(|_| NotesError::ConfigError {
                message: format!("server URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .push("note")
            .push(id);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bearer {token}"))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Envelope<T>> {
        let response = request.send().await?;
        let http_status = response.status();
        trace!("Received HTTP {}", http_status);

        let envelope: Envelope<T> = response.json().await?;
        debug!(
            "Reply status {:?} ({}): {}",
            envelope.status, http_status, envelope.message
        );
        envelope.into_result()
    }
}

impl NotesBackend for HttpBackend {
    async fn register(&self, input: &RegisterInput) -> Result<String> {
        let request = self.client.post(self.url("/user/register")).json(input);
        Ok(self.send::<()>(request).await?.message)
    }

    async fn login(&self, input: &LoginInput) -> Result<LoginReply> {
        let request = self.client.post(self.url("/user/login")).json(input);
        let envelope = self.send::<()>(request).await?;

        match (envelope.user, envelope.token) {
            (Some(user), Some(token)) => Ok(LoginReply { user, token }),
            _ => Err(NotesError::ApplicationError {
                message: "login reply without user or token".to_string(),
            }),
        }
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let request = self.authorized(self.client.post(self.url("/user/logout")), token);
        self.send::<()>(request).await.map(|_| ())
    }

    async fn forgot_password(&self, email: &str) -> Result<String> {
        let input = ForgotPasswordInput {
            email: email.to_string(),
        };
        let request = self
            .client
            .post(self.url("/api/forgot-password"))
            .json(&input);
        Ok(self.send::<()>(request).await?.message)
    }

    async fn list_notes(&self, token: &str) -> Result<Vec<Note>> {
        let request = self.authorized(self.client.get(self.url("/note")), token);
        Ok(self.send::<Vec<Note>>(request).await?.data.unwrap_or_default())
    }

    async fn create_note(&self, token: &str, draft: &NoteDraft) -> Result<Note> {
        let request = self
            .authorized(self.client.post(self.url("/note/create")), token)
            .json(draft);

        self.send::<Note>(request)
            .await?
            .data
            .ok_or_else(|| NotesError::ApplicationError {
                message: "create reply without note".to_string(),
            })
    }

    async fn update_note(&self, token: &str, id: &str, patch: &NotePatch) -> Result<()> {
        let request = self
            .authorized(self.client.patch(self.note_url(id)?), token)
            .json(patch);
        self.send::<()>(request).await.map(|_| ())
    }

    async fn delete_note(&self, token: &str, id: &str) -> Result<()> {
        let request = self.authorized(self.client.delete(self.note_url(id)?), token);
        self.send::<()>(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_url_escapes_separators() {
        let backend = HttpBackend::new("http://localhost:8080");
        assert_eq!(
            backend.note_url("5e1c-ab_9").unwrap().as_str(),
            "http://localhost:8080/note/5e1c-ab_9"
        );
        assert_eq!(
            backend.note_url("a/b c").unwrap().as_str(),
            "http://localhost:8080/note/a%2Fb%20c"
        );
    }

    #[test]
    fn note_url_keeps_base_path() {
        let backend = HttpBackend::new("http://localhost:8080/api/");
        assert_eq!(
            backend.note_url("42").unwrap().as_str(),
            "http://localhost:8080/api/note/42"
        );
    }

    #[test]
    fn unusable_base_url_is_a_config_error() {
        let backend = HttpBackend::new("not a url");
        assert!(matches!(
            backend.note_url("42"),
            Err(NotesError::ConfigError { .. })
        ));
    }

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpBackend::new("http://localhost:8080/");
        assert_eq!(backend.url("/note"), "http://localhost:8080/note");
    }
}
