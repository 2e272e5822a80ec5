//! HTTP surface of the notes API.
//!
//! Every reply is an [`Envelope`]; the HTTP status code only mirrors it.
//! Note ids travel either in the path (`/note/{id}`) or, for older clients,
//! in an `id` header on `/note/`.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
    time,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    Config, Envelope, ForgotPasswordInput, LoginInput, Note, NoteDraft, NotePatch, NotesError,
    RegisterInput, Services,
};

const NOTE_ID_HEADER: &str = "id";
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

type Shared = Arc<Services>;

/// Error half of every handler: an error rendered as a failure envelope.
#[derive(Debug)]
pub struct ApiError(pub NotesError);

impl From<NotesError> for ApiError {
    fn from(err: NotesError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = http_status(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }

        (status, Json(Envelope::<()>::from_error(&self.0))).into_response()
    }
}

pub fn http_status(err: &NotesError) -> StatusCode {
    match err {
        NotesError::Validation { .. } | NotesError::Rejected { .. } => StatusCode::BAD_REQUEST,
        NotesError::Unauthorized | NotesError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        NotesError::NoteNotFound { .. } | NotesError::EmailNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        NotesError::UserAlreadyExists { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = std::result::Result<Json<Envelope<T>>, ApiError>;

/// Raw session token from `Authorization: Bearer <token>`, or from a bare
/// `Authorization: <token>` as older web clients send it.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        let token = match header.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            _ => header,
        };

        if token.is_empty() {
            warn!("Request to {} without session token", parts.uri.path());
            return Err(ApiError(NotesError::Unauthorized));
        }
        Ok(SessionToken(token.to_string()))
    }
}

/// Note id carried in the legacy `id` header.
#[derive(Debug, Clone)]
pub struct NoteIdHeader(pub String);

impl<S: Send + Sync> FromRequestParts<S> for NoteIdHeader {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(NOTE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| NoteIdHeader(id.to_string()))
            .ok_or_else(|| ApiError(NotesError::validation("Note id is required")))
    }
}

pub fn router(services: Shared) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(health))
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/api/forgot-password", post(forgot_password))
        .route("/note", get(list_notes))
        .route("/note/create", post(create_note))
        .route(
            "/note/",
            patch(update_note_by_header).delete(delete_note_by_header),
        )
        .route("/note/{id}", patch(update_note).delete(delete_note))
        .layer(cors)
        .with_state(services)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "API is working now" }))
}

async fn register(
    State(services): State<Shared>,
    body: Result<Json<RegisterInput>, JsonRejection>,
) -> ApiResult<()> {
    let input = parse_body(body)?;
    blocking(move || services.users.register(input)).await?;
    Ok(Json(Envelope::success("Signup successful")))
}

async fn login(
    State(services): State<Shared>,
    body: Result<Json<LoginInput>, JsonRejection>,
) -> ApiResult<()> {
    let input = parse_body(body)?;
    let outcome = blocking(move || services.users.login(input)).await?;
    Ok(Json(Envelope::login(outcome.user, outcome.token)))
}

async fn logout(State(services): State<Shared>, SessionToken(token): SessionToken) -> ApiResult<()> {
    blocking(move || services.users.logout(&token)).await?;
    Ok(Json(Envelope::success("Logged out")))
}

async fn forgot_password(
    State(services): State<Shared>,
    body: Result<Json<ForgotPasswordInput>, JsonRejection>,
) -> ApiResult<()> {
    let input = parse_body(body)?;
    blocking(move || services.users.forgot_password(input)).await?;
    Ok(Json(Envelope::success(
        "Password reset link sent to your email.",
    )))
}

async fn list_notes(
    State(services): State<Shared>,
    SessionToken(token): SessionToken,
) -> ApiResult<Vec<Note>> {
    let notes = blocking(move || services.notes.list(&token)).await?;
    Ok(Json(Envelope::with_data("Notes fetched", notes)))
}

async fn create_note(
    State(services): State<Shared>,
    SessionToken(token): SessionToken,
    body: Result<Json<NoteDraft>, JsonRejection>,
) -> ApiResult<Note> {
    let draft = parse_body(body)?;
    let note = blocking(move || services.notes.create(&token, draft)).await?;
    Ok(Json(Envelope::with_data("Note created", note)))
}

async fn update_note(
    State(services): State<Shared>,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
    body: Result<Json<NotePatch>, JsonRejection>,
) -> ApiResult<()> {
    apply_update(services, token, id, body).await
}

async fn update_note_by_header(
    State(services): State<Shared>,
    SessionToken(token): SessionToken,
    NoteIdHeader(id): NoteIdHeader,
    body: Result<Json<NotePatch>, JsonRejection>,
) -> ApiResult<()> {
    apply_update(services, token, id, body).await
}

async fn delete_note(
    State(services): State<Shared>,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
) -> ApiResult<()> {
    apply_delete(services, token, id).await
}

async fn delete_note_by_header(
    State(services): State<Shared>,
    SessionToken(token): SessionToken,
    NoteIdHeader(id): NoteIdHeader,
) -> ApiResult<()> {
    apply_delete(services, token, id).await
}

async fn apply_update(
    services: Shared,
    token: String,
    id: String,
    body: Result<Json<NotePatch>, JsonRejection>,
) -> ApiResult<()> {
    let patch = parse_body(body)?;
    blocking(move || services.notes.update(&token, &id, patch)).await?;
    Ok(Json(Envelope::success("Note updated")))
}

async fn apply_delete(services: Shared, token: String, id: String) -> ApiResult<()> {
    blocking(move || services.notes.delete(&token, &id)).await?;
    Ok(Json(Envelope::success("Note deleted")))
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        debug!("Malformed request body: {}", rejection.body_text());
        ApiError(NotesError::validation("Invalid request body"))
    })
}

/// Runs a storage or hashing call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            ApiError(NotesError::ApplicationError {
                message: format!("worker task failed: {e}"),
            })
        })?
        .map_err(ApiError)
}

/// A bound, not yet running, notes server.
pub struct NotesServer {
    listener: TcpListener,
    services: Shared,
}

impl NotesServer {
    /// Opens the store and binds the listener. Port 0 picks a free port.
    pub async fn bind(config: &Config) -> crate::Result<Self> {
        let services = Arc::new(Services::open(config)?);
        let address = config.socket_addr();
        info!("Binding to {address}");
        let listener = TcpListener::bind(&address).await?;

        Ok(Self { listener, services })
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> crate::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.local_addr()?;
        let sweeper = spawn_session_sweeper(Arc::clone(&self.services));
        let app = router(self.services);

        info!("Server running on {address}");
        let served = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        sweeper.abort();
        info!("Server shutting down");
        Ok(served?)
    }
}

/// Binds per `config` and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> crate::Result<()> {
    NotesServer::bind(&config)
        .await?
        .run_until(shutdown_signal())
        .await
}

fn spawn_session_sweeper(services: Shared) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(SESSION_SWEEP_INTERVAL);
        interval.tick().await;

        loop {
            interval.tick().await;
            match services.sessions.purge_expired() {
                Ok(0) => {}
                Ok(count) => info!("Dropped {} expired sessions", count),
                Err(e) => error!("Session sweep failed: {}", e),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_error_kind() {
        assert_eq!(
            http_status(&NotesError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            http_status(&NotesError::validation("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            http_status(&NotesError::UserAlreadyExists {
                email: "a@b".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            http_status(&NotesError::NoteNotFound { id: "1".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            http_status(&NotesError::ApplicationError {
                message: "boom".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
